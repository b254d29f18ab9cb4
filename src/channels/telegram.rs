use super::traits::{Channel, ChannelMessage};
use async_trait::async_trait;
use uuid::Uuid;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const START_REPLY: &str = "Hi! Send me any message and I'll reply using FreeGPT4.";
const HELP_REPLY: &str = "Just send a message, no commands needed.";

/// Telegram channel - long-polls the Bot API for updates
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
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
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Register a webhook with the Bot API. The HTTP endpoint serving the
    /// webhook calls is deployed separately; this only points Telegram at it.
    pub async fn set_webhook(&self, url: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(self.api_url("setWebhook"))
            .json(&serde_json::json!({
                "url": url,
                "drop_pending_updates": true
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_failure("Telegram setWebhook", resp).await);
        }

        let data: serde_json::Value = resp.json().await?;
        if data.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let desc = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("Telegram setWebhook rejected: {desc}");
        }

        tracing::info!("Telegram webhook registered: {url}");
        Ok(())
    }

    /// Ask for only the newest pending update, so the next poll's offset
    /// confirms everything that queued up while the bot was down.
    async fn discard_backlog(&self) -> i64 {
        let body = serde_json::json!({ "offset": -1, "limit": 1, "timeout": 0 });

        let resp = match self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Telegram backlog discard failed: {e}");
                return 0;
            }
        };

        let data: serde_json::Value = match resp.json().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Telegram backlog discard parse error: {e}");
                return 0;
            }
        };

        data.get("result")
            .and_then(serde_json::Value::as_array)
            .and_then(|results| results.last())
            .and_then(|update| update.get("update_id"))
            .and_then(serde_json::Value::as_i64)
            .map_or(0, |uid| uid + 1)
    }

    async fn send_plain(&self, message: &str, chat_id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": message
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_failure("Telegram sendMessage", resp).await);
        }
        Ok(())
    }
}

/// Static reply for the supported bot commands, `None` otherwise. Commands
/// may carry an `@BotName` suffix in group chats.
fn command_reply(text: &str) -> Option<&'static str> {
    if !text.starts_with('/') {
        return None;
    }
    let command = text
        .split_whitespace()
        .next()
        .and_then(|token| token.split('@').next())?;

    match command {
        "/start" => Some(START_REPLY),
        "/help" => Some(HELP_REPLY),
        _ => None,
    }
}

async fn api_failure(context: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::anyhow!("{context} failed with {status}: {body}")
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str, chat_id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": message,
                "parse_mode": "Markdown"
            }))
            .send()
            .await?;

        // Unbalanced markdown entities in model output come back as 400.
        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            tracing::debug!("Telegram rejected markdown; retrying as plain text");
            return self.send_plain(message, chat_id).await;
        }

        if !resp.status().is_success() {
            return Err(api_failure("Telegram sendMessage", resp).await);
        }
        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<ChannelMessage>) -> anyhow::Result<()> {
        let mut offset = self.discard_backlog().await;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let url = self.api_url("getUpdates");
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });

            let resp = match self.client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let data: serde_json::Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            // Rejected polls (bad token, conflicting webhook) return fast;
            // back off instead of re-polling immediately.
            if data.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
                let desc = data
                    .get("description")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown error");
                tracing::warn!("Telegram getUpdates rejected: {desc}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }

            if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(message) = update.get("message") else {
                        continue;
                    };

                    let Some(text) = message.get("text").and_then(serde_json::Value::as_str) else {
                        continue;
                    };

                    let Some(chat_id) = message
                        .get("chat")
                        .and_then(|c| c.get("id"))
                        .and_then(serde_json::Value::as_i64)
                    else {
                        continue;
                    };
                    let chat_id = chat_id.to_string();

                    // The command surface is closed: /start and /help get
                    // fixed replies, any other slash-command is dropped
                    // with no reply and no backend call.
                    if text.starts_with('/') {
                        if let Some(reply) = command_reply(text) {
                            if let Err(err) = self.send(reply, &chat_id).await {
                                tracing::warn!("Telegram command reply failed: {err}");
                            }
                        } else {
                            tracing::debug!("Ignoring unsupported Telegram command");
                        }
                        continue;
                    }

                    if text.trim().is_empty() {
                        continue;
                    }

                    // Channel posts carry no author to attribute.
                    let Some(user_id) = message
                        .get("from")
                        .and_then(|f| f.get("id"))
                        .and_then(serde_json::Value::as_i64)
                    else {
                        continue;
                    };

                    let msg = ChannelMessage {
                        id: Uuid::new_v4().to_string(),
                        sender: user_id.to_string(),
                        reply_target: chat_id,
                        content: text.to_string(),
                        channel: "telegram".to_string(),
                        timestamp: std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_secs(),
                    };

                    if tx.send(msg).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn start_typing(&self, recipient: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&serde_json::json!({
                "chat_id": recipient,
                "action": "typing"
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Telegram sendChatAction failed with {}", resp.status());
        }
        Ok(())
    }
}
