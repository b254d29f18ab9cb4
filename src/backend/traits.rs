use async_trait::async_trait;
use std::path::PathBuf;

/// Options forwarded on every generation call. The bridge always sends the
/// same bundle; it is built once from config at startup.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub use_history: bool,
    pub remove_sources: bool,
    pub use_proxies: bool,
    pub cookie_file: PathBuf,
}

impl GenerateOptions {
    /// Bridge defaults: per-user history on, source citations stripped,
    /// no proxies.
    pub fn for_bridge(cookie_file: PathBuf) -> Self {
        Self {
            use_history: true,
            remove_sources: true,
            use_proxies: false,
            cookie_file,
        }
    }
}

/// Opaque asynchronous generation call into the AI backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// May fail with any error kind; callers treat all failures identically.
    async fn generate(
        &self,
        message: &str,
        username: &str,
        opts: &GenerateOptions,
    ) -> anyhow::Result<String>;

    /// Cheap reachability check for diagnostics.
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_options_enable_history_and_strip_sources() {
        let opts = GenerateOptions::for_bridge(PathBuf::from("/tmp/cookies.json"));
        assert!(opts.use_history);
        assert!(opts.remove_sources);
        assert!(!opts.use_proxies);
        assert_eq!(opts.cookie_file, PathBuf::from("/tmp/cookies.json"));
    }
}
