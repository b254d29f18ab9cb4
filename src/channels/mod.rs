pub mod slack;
pub mod telegram;
pub mod traits;

pub use slack::SlackChannel;
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelMessage};
