use crate::channels::Channel;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Platform typing indicators expire after roughly five seconds; pulsing
/// every four keeps them visibly continuous.
pub const TYPING_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps a "typing" indicator alive while a response is being computed.
///
/// The pulse runs as a background task and stops when the guard is dropped,
/// so cancellation needs no cooperation from the response path. Indicator
/// failures are logged and never interrupt the pulse.
pub struct TypingPulse {
    handle: JoinHandle<()>,
}

impl TypingPulse {
    pub fn start(channel: Arc<dyn Channel>, recipient: String) -> Self {
        Self::start_every(channel, recipient, TYPING_INTERVAL)
    }

    /// First pulse fires immediately so even fast responses show feedback.
    pub fn start_every(channel: Arc<dyn Channel>, recipient: String, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = channel.start_typing(&recipient).await {
                    debug!(
                        channel = channel.name(),
                        error = %err,
                        "typing indicator failed"
                    );
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { handle }
    }
}

impl Drop for TypingPulse {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
