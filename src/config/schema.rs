use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (cookie file, future state) - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub channels: ChannelsConfig,
}

// ── Section configs ───────────────────────────────────────────────

/// Conversational AI backend the bots relay messages to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the generation API.
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Optional bearer token for the generation API.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_key: None,
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:5500".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Cookie file forwarded verbatim to the backend on every generate call.
    /// Defaults to `<data_dir>/cookies.json` when unset.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,
}

/// Per-platform bot sections. A missing section disables that platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub use_webhook: bool,
    /// Alternate Bot API host, for self-hosted bot-api servers.
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...) for the Web API.
    #[serde(default)]
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode.
    #[serde(default)]
    pub app_token: String,
}

// ── Loading and overrides ─────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let base = UserDirs::new()
            .map(|u| u.home_dir().join(".botbridge"))
            .unwrap_or_else(|| PathBuf::from(".botbridge"));
        Self {
            data_dir: base.join("data"),
            config_path: base.join("config.toml"),
            backend: BackendConfig::default(),
            files: FilesConfig::default(),
            channels: ChannelsConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let botbridge_dir = home.join(".botbridge");
        let config_path = botbridge_dir.join("config.toml");
        let data_dir = botbridge_dir.join("data");

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let toml_str =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            fs::write(&config_path, toml_str).context("Failed to write config file")?;
            config
        };

        // Set computed paths that are skipped during serialization
        config.config_path = config_path;
        config.data_dir = data_dir;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to config.
    ///
    /// A platform token in the environment materializes that platform's
    /// section even when the config file omitted it.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.channels
                    .telegram
                    .get_or_insert_with(TelegramConfig::default)
                    .bot_token = token;
            }
        }
        if let Some(telegram) = self.channels.telegram.as_mut() {
            if let Ok(url) = std::env::var("TELEGRAM_WEBHOOK_URL") {
                if !url.is_empty() {
                    telegram.webhook_url = Some(url);
                }
            }
            if let Ok(val) = std::env::var("TELEGRAM_USE_WEBHOOK") {
                telegram.use_webhook = val == "1" || val.eq_ignore_ascii_case("true");
            }
            if let Ok(base) = std::env::var("TELEGRAM_API_URL") {
                if !base.is_empty() {
                    telegram.api_base = Some(base);
                }
            }
        }

        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            if !token.is_empty() {
                self.channels
                    .slack
                    .get_or_insert_with(SlackConfig::default)
                    .bot_token = token;
            }
        }
        if let Ok(token) = std::env::var("SLACK_APP_TOKEN") {
            if !token.is_empty() {
                self.channels
                    .slack
                    .get_or_insert_with(SlackConfig::default)
                    .app_token = token;
            }
        }

        if let Ok(url) = std::env::var("BOTBRIDGE_BACKEND_URL") {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(path) = std::env::var("BOTBRIDGE_COOKIES_FILE") {
            if !path.is_empty() {
                self.files.cookies_file = Some(PathBuf::from(path));
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).context("Failed to create config directory")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Effective cookie-file path: explicit setting or `<data_dir>/cookies.json`.
    pub fn cookies_file(&self) -> PathBuf {
        self.files
            .cookies_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("cookies.json"))
    }
}
