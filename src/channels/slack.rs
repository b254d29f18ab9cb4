use super::traits::{Channel, ChannelMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Slack channel - receives events over Socket Mode, replies via Web API
pub struct SlackChannel {
    bot_token: String,
    app_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(bot_token: String, app_token: String) -> Self {
        Self {
            bot_token,
            app_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different API host (used by tests).
    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Open a Socket Mode connection slot and return the WebSocket URL.
    /// Requires the app-level token, not the bot token.
    async fn connect_url(&self) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(self.api_url("apps.connections.open"))
            .bearer_auth(&self.app_token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));

        if !status.is_success() {
            anyhow::bail!("Slack apps.connections.open failed ({status}): {body}");
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        if parsed.get("ok") != Some(&serde_json::Value::Bool(true)) {
            let err = parsed
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            anyhow::bail!("Slack apps.connections.open failed: {err}");
        }

        parsed
            .get("url")
            .and_then(|u| u.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow::anyhow!("Slack apps.connections.open returned no url"))
    }
}

/// Convert an Events API `message` event into a `ChannelMessage`.
/// Bot posts and subtyped events (edits, joins, thread broadcasts) are
/// dropped so the bot never answers itself.
fn event_to_message(event: &serde_json::Value) -> Option<ChannelMessage> {
    if event.get("type").and_then(serde_json::Value::as_str) != Some("message") {
        return None;
    }
    if event.get("bot_id").is_some() || event.get("subtype").is_some() {
        return None;
    }

    let text = event.get("text").and_then(serde_json::Value::as_str)?;
    if text.trim().is_empty() {
        return None;
    }
    let user = event.get("user").and_then(serde_json::Value::as_str)?;
    let channel_id = event.get("channel").and_then(serde_json::Value::as_str)?;
    let ts = event
        .get("ts")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("0");

    Some(ChannelMessage {
        // Deterministic ID prevents duplicates across reconnects
        id: format!("slack_{channel_id}_{ts}"),
        sender: user.to_string(),
        reply_target: channel_id.to_string(),
        content: text.to_string(),
        channel: "slack".to_string(),
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    })
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, message: &str, channel: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "channel": channel,
            "text": message
        });

        let resp = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));

        if !status.is_success() {
            anyhow::bail!("Slack chat.postMessage failed ({status}): {body}");
        }

        // Slack returns 200 for most app-level errors; check JSON "ok" field
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        if parsed.get("ok") == Some(&serde_json::Value::Bool(false)) {
            let err = parsed
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            anyhow::bail!("Slack chat.postMessage failed: {err}");
        }

        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        tracing::info!("Slack channel connecting in Socket Mode...");

        loop {
            let ws_url = match self.connect_url().await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Slack connection registration failed: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let (ws_stream, _) = match connect_async(&ws_url).await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Slack WebSocket connect failed: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };
            let (mut write, mut read) = ws_stream.split();

            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(payload)) => {
                        let envelope: serde_json::Value = match serde_json::from_str(&payload) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!("Slack envelope parse error: {e}");
                                continue;
                            }
                        };

                        // Every envelope must be acked or Slack redelivers it
                        if let Some(envelope_id) =
                            envelope.get("envelope_id").and_then(serde_json::Value::as_str)
                        {
                            let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
                            if let Err(e) = write.send(WsMessage::Text(ack.into())).await {
                                tracing::warn!("Slack ack failed: {e}");
                                break;
                            }
                        }

                        match envelope.get("type").and_then(serde_json::Value::as_str) {
                            Some("hello") => {
                                tracing::info!("Slack Socket Mode connected");
                            }
                            Some("disconnect") => {
                                tracing::info!("Slack requested reconnect");
                                break;
                            }
                            Some("events_api") => {
                                let event = envelope
                                    .get("payload")
                                    .and_then(|p| p.get("event"));
                                let Some(msg) = event.and_then(event_to_message) else {
                                    continue;
                                };
                                if tx.send(msg).await.is_err() {
                                    return Ok(());
                                }
                            }
                            _ => {}
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        tracing::info!("Slack socket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Slack socket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            tracing::info!("Slack socket disconnected; reconnecting...");
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(self.api_url("auth.test"))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
