use async_trait::async_trait;

/// Inbound message, normalized across platforms
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: String,
    /// Platform identifier of the author. Feeds virtual-user resolution.
    pub sender: String,
    /// Where the reply goes: a chat id on Telegram, a channel id on Slack.
    pub reply_target: String,
    pub content: String,
    pub channel: String,
    pub timestamp: u64,
}

/// Core channel trait - implement for any messaging platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Send a message through this channel
    async fn send(&self, message: &str, recipient: &str) -> anyhow::Result<()>;

    /// Start listening for incoming messages (long-running)
    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()>;

    /// Check if channel is healthy
    async fn health_check(&self) -> bool {
        true
    }

    /// Signal that the bot is working on a response (e.g. "typing" indicator).
    /// Platform indicators expire on their own; callers re-send while work
    /// is in flight.
    async fn start_typing(&self, _recipient: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
