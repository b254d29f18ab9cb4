use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Account record owned by the external user store. The bridge only ever
/// checks existence and triggers creation; history and settings stay behind
/// the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
    #[error("user already exists: {0}")]
    AlreadyExists(String),
    #[error("user store error: {0}")]
    Backend(String),
}

/// Lookup/create surface of the user store. Implementations must tolerate
/// concurrent calls from multiple adapters.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Create the account. Returns `AlreadyExists` when another caller got
    /// there first; callers decide whether that counts as success.
    async fn create(&self, username: &str) -> Result<UserRecord, StoreError>;
}

/// Process-local store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn create(&self, username: &str) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(StoreError::AlreadyExists(username.to_string()));
        }
        let record = UserRecord {
            username: username.to_string(),
        };
        users.insert(username.to_string(), record.clone());
        Ok(record)
    }
}
