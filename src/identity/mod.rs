use crate::store::UserStore;
use std::fmt;
use std::sync::Arc;

/// Shared account used when a virtual user cannot be resolved. Conversations
/// still get replies under this identity, just without per-user history.
pub const FALLBACK_USERNAME: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Telegram,
    Slack,
}

impl Platform {
    /// Prefix namespacing virtual usernames across platforms.
    pub fn username_prefix(self) -> &'static str {
        match self {
            Platform::Telegram => "tg_",
            Platform::Slack => "slack_",
        }
    }

    pub fn from_channel(name: &str) -> Option<Self> {
        match name {
            "telegram" => Some(Platform::Telegram),
            "slack" => Some(Platform::Slack),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Telegram => write!(f, "telegram"),
            Platform::Slack => write!(f, "slack"),
        }
    }
}

/// Sender identity as seen by one platform, derived per incoming event.
/// The platform-native user id must be non-empty; adapters drop events
/// without a sender before this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub platform: Platform,
    pub user_id: String,
    pub chat_id: Option<String>,
}

impl ExternalIdentity {
    pub fn new(platform: Platform, user_id: impl Into<String>) -> Self {
        Self {
            platform,
            user_id: user_id.into(),
            chat_id: None,
        }
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Deterministic internal username for this identity.
    pub fn virtual_username(&self) -> String {
        format!("{}{}", self.platform.username_prefix(), self.user_id)
    }
}

/// Maps external identities to internal accounts, creating them lazily.
///
/// Resolution never fails: when the store cannot produce the virtual
/// account, the shared fallback identity is returned instead so the
/// conversation still gets a reply.
pub struct UserResolver {
    store: Arc<dyn UserStore>,
}

impl UserResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, identity: &ExternalIdentity) -> String {
        let username = identity.virtual_username();

        match self.store.lookup(&username).await {
            Ok(Some(_)) => return username,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    username = %username,
                    error = %err,
                    "user store lookup failed; falling back to shared identity"
                );
                return FALLBACK_USERNAME.to_string();
            }
        }

        match self.store.create(&username).await {
            Ok(_) => {
                tracing::debug!(username = %username, "created virtual user");
                username
            }
            Err(create_err) => {
                // A concurrent first message may have created the account
                // between our lookup and create. That is success, not an
                // outage.
                if let Ok(Some(_)) = self.store.lookup(&username).await {
                    tracing::debug!(
                        username = %username,
                        "virtual user created concurrently; reusing"
                    );
                    return username;
                }
                tracing::warn!(
                    username = %username,
                    error = %create_err,
                    "could not create virtual user; falling back to shared identity"
                );
                FALLBACK_USERNAME.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, UserRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn virtual_username_is_prefixed_per_platform() {
        let tg = ExternalIdentity::new(Platform::Telegram, "123456789");
        assert_eq!(tg.virtual_username(), "tg_123456789");

        let slack = ExternalIdentity::new(Platform::Slack, "U0AB12CD3");
        assert_eq!(slack.virtual_username(), "slack_U0AB12CD3");
    }

    #[test]
    fn virtual_username_is_deterministic() {
        let a = ExternalIdentity::new(Platform::Telegram, "42").with_chat_id("-100");
        let b = ExternalIdentity::new(Platform::Telegram, "42");
        assert_eq!(a.virtual_username(), b.virtual_username());
    }

    #[test]
    fn platform_from_channel_name() {
        assert_eq!(Platform::from_channel("telegram"), Some(Platform::Telegram));
        assert_eq!(Platform::from_channel("slack"), Some(Platform::Slack));
        assert_eq!(Platform::from_channel("discord"), None);
    }

    #[tokio::test]
    async fn first_contact_creates_account_once() {
        let store = Arc::new(MemoryStore::new());
        let resolver = UserResolver::new(store.clone());
        let identity = ExternalIdentity::new(Platform::Telegram, "7");

        assert_eq!(resolver.resolve(&identity).await, "tg_7");
        assert_eq!(store.len(), 1);

        // Subsequent contacts reuse the record
        assert_eq!(resolver.resolve(&identity).await, "tg_7");
        assert_eq!(store.len(), 1);
    }

    struct DownStore;

    #[async_trait]
    impl UserStore for DownStore {
        async fn lookup(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
            Ok(None)
        }
        async fn create(&self, _username: &str) -> Result<UserRecord, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn create_failure_falls_back_to_admin() {
        let resolver = UserResolver::new(Arc::new(DownStore));
        let identity = ExternalIdentity::new(Platform::Slack, "U9");

        assert_eq!(resolver.resolve(&identity).await, FALLBACK_USERNAME);
    }

    struct BrokenLookupStore;

    #[async_trait]
    impl UserStore for BrokenLookupStore {
        async fn lookup(&self, _username: &str) -> Result<Option<UserRecord>, StoreError> {
            Err(StoreError::Backend("disk error".into()))
        }
        async fn create(&self, username: &str) -> Result<UserRecord, StoreError> {
            Ok(UserRecord {
                username: username.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_admin() {
        let resolver = UserResolver::new(Arc::new(BrokenLookupStore));
        let identity = ExternalIdentity::new(Platform::Telegram, "1");

        assert_eq!(resolver.resolve(&identity).await, FALLBACK_USERNAME);
    }

    /// Lookup misses, create loses a race, second lookup finds the record
    /// written by the concurrent creator.
    struct RacingStore {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn lookup(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(Some(UserRecord {
                    username: username.to_string(),
                }))
            }
        }
        async fn create(&self, username: &str) -> Result<UserRecord, StoreError> {
            Err(StoreError::AlreadyExists(username.to_string()))
        }
    }

    #[tokio::test]
    async fn lost_creation_race_still_resolves_virtual_username() {
        let resolver = UserResolver::new(Arc::new(RacingStore {
            lookups: AtomicUsize::new(0),
        }));
        let identity = ExternalIdentity::new(Platform::Telegram, "55");

        assert_eq!(resolver.resolve(&identity).await, "tg_55");
    }
}
