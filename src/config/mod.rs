pub mod schema;

pub use schema::{BackendConfig, ChannelsConfig, Config, FilesConfig, SlackConfig, TelegramConfig};
