//! Bot launchers and the shared receive/respond/send loop.
//!
//! Launchers are callable from both async and blocking contexts: when a
//! Tokio runtime is already running the bot joins it as a task, otherwise
//! the bot gets its own single-threaded runtime on a background thread.

use crate::backend::Backend;
use crate::channels::{Channel, ChannelMessage, SlackChannel, TelegramChannel};
use crate::config::{Config, TelegramConfig};
use crate::identity::{ExternalIdentity, Platform};
use crate::liveness::TypingPulse;
use crate::orchestrator::Responder;
use crate::segment::{split_message, MAX_MESSAGE_LEN};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How a bot launch ended up running.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// Running as a task on the caller's runtime.
    Attached(JoinHandle<()>),
    /// Running on its own runtime in a background thread.
    Detached,
    /// Required tokens are missing; nothing was started.
    Disabled,
}

impl LaunchOutcome {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn into_join_handle(self) -> Option<JoinHandle<()>> {
        match self {
            Self::Attached(handle) => Some(handle),
            Self::Detached | Self::Disabled => None,
        }
    }
}

/// Launch the Telegram bot if a token is configured.
pub fn start_telegram_bot(config: &Config, responder: Arc<Responder>) -> LaunchOutcome {
    let Some(tg) = config
        .channels
        .telegram
        .as_ref()
        .filter(|t| !t.bot_token.trim().is_empty())
    else {
        tracing::info!("TELEGRAM_BOT_TOKEN not set; Telegram bot disabled");
        return LaunchOutcome::Disabled;
    };

    let channel = telegram_channel(tg);

    if tg.use_webhook {
        if let Some(url) = tg.webhook_url.clone().filter(|u| !u.trim().is_empty()) {
            return launch("telegram-bot", register_webhook(channel, url));
        }
        tracing::warn!("TELEGRAM_USE_WEBHOOK set without TELEGRAM_WEBHOOK_URL; using polling");
    }

    launch("telegram-bot", run_channel(Arc::new(channel), responder))
}

fn telegram_channel(tg: &TelegramConfig) -> TelegramChannel {
    let channel = TelegramChannel::new(tg.bot_token.clone());
    match tg.api_base.clone().filter(|b| !b.trim().is_empty()) {
        Some(base) => channel.with_api_base(base),
        None => channel,
    }
}

/// Launch the Slack bot if both tokens are configured.
pub fn start_slack_bot(config: &Config, responder: Arc<Responder>) -> LaunchOutcome {
    let Some(slack) = config
        .channels
        .slack
        .as_ref()
        .filter(|s| !s.bot_token.trim().is_empty() && !s.app_token.trim().is_empty())
    else {
        tracing::info!("SLACK_BOT_TOKEN or SLACK_APP_TOKEN not set; Slack bot disabled");
        return LaunchOutcome::Disabled;
    };

    let channel = SlackChannel::new(slack.bot_token.clone(), slack.app_token.clone());
    launch("slack-bot", run_channel(Arc::new(channel), responder))
}

/// Launch every configured bot. Outcomes come back in platform order:
/// Telegram, then Slack.
pub fn start_bots(config: &Config, responder: Arc<Responder>) -> Vec<LaunchOutcome> {
    vec![
        start_telegram_bot(config, responder.clone()),
        start_slack_bot(config, responder),
    ]
}

/// Run `fut` on the current runtime when one exists, otherwise on a
/// dedicated thread with its own runtime.
fn launch(name: &'static str, fut: impl Future<Output = ()> + Send + 'static) -> LaunchOutcome {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => LaunchOutcome::Attached(handle.spawn(fut)),
        Err(_) => spawn_detached(name, fut),
    }
}

fn spawn_detached(
    name: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) -> LaunchOutcome {
    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(fut),
                Err(e) => tracing::error!("Failed to build runtime for {name}: {e}"),
            }
        });

    match spawned {
        Ok(_) => LaunchOutcome::Detached,
        Err(e) => {
            tracing::error!("Failed to spawn {name} thread: {e}");
            LaunchOutcome::Disabled
        }
    }
}

async fn register_webhook(channel: TelegramChannel, url: String) {
    if let Err(e) = channel.set_webhook(&url).await {
        tracing::error!("Telegram webhook registration failed: {e}");
    }
}

/// Receive loop shared by all platforms. Each message is handled on its
/// own task so one slow response never blocks the others.
///
/// Public so embedders can run the standard loop over their own
/// [`Channel`] implementation. Returns when the listener stops.
pub async fn run_channel(channel: Arc<dyn Channel>, responder: Arc<Responder>) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<ChannelMessage>(100);

    let listener = {
        let channel = channel.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.listen(tx).await {
                tracing::error!("{} listener stopped: {e}", channel.name());
            }
        })
    };

    while let Some(msg) = rx.recv().await {
        if msg.content.trim().is_empty() {
            continue;
        }
        let Some(platform) = Platform::from_channel(&msg.channel) else {
            tracing::warn!("Dropping message from unknown channel '{}'", msg.channel);
            continue;
        };

        let channel = channel.clone();
        let responder = responder.clone();
        tokio::spawn(async move {
            dispatch_message(channel, responder, platform, msg).await;
        });
    }

    listener.abort();
}

/// Answer a single message: typing indicator up while the response is
/// generated, then the reply goes out in order, chunk by chunk.
async fn dispatch_message(
    channel: Arc<dyn Channel>,
    responder: Arc<Responder>,
    platform: Platform,
    msg: ChannelMessage,
) {
    let identity = ExternalIdentity::new(platform, msg.sender.as_str())
        .with_chat_id(msg.reply_target.as_str());

    let typing = TypingPulse::start(channel.clone(), msg.reply_target.clone());
    let reply = responder.respond(&identity, &msg.content).await;
    drop(typing);

    for chunk in split_message(&reply, MAX_MESSAGE_LEN) {
        if let Err(err) = channel.send(&chunk, &msg.reply_target).await {
            tracing::error!("{} send failed: {err}", channel.name());
            break;
        }
    }
}

/// Check every configured component and report reachability.
pub async fn doctor(config: &Config, backend: &dyn Backend) {
    println!("botbridge doctor\n");
    println!("  config:  {}", config.config_path.display());
    println!("  cookies: {}\n", config.cookies_file().display());

    let backend_ok = backend.health_check().await;
    println!(
        "  {} Backend ({})",
        status_icon(backend_ok),
        config.backend.base_url
    );

    match config.channels.telegram.as_ref() {
        Some(tg) if !tg.bot_token.trim().is_empty() => {
            let channel = telegram_channel(tg);
            println!("  {} Telegram", status_icon(channel.health_check().await));
        }
        _ => println!("  ❌ Telegram (not configured)"),
    }

    match config.channels.slack.as_ref() {
        Some(s) if !s.bot_token.trim().is_empty() && !s.app_token.trim().is_empty() => {
            let channel = SlackChannel::new(s.bot_token.clone(), s.app_token.clone());
            println!("  {} Slack", status_icon(channel.health_check().await));
        }
        _ => println!("  ❌ Slack (not configured)"),
    }
}

fn status_icon(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerateOptions;
    use crate::identity::UserResolver;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct NoopBackend;

    #[async_trait]
    impl Backend for NoopBackend {
        async fn generate(
            &self,
            _message: &str,
            _username: &str,
            _opts: &GenerateOptions,
        ) -> anyhow::Result<String> {
            Ok("reply".into())
        }
    }

    fn test_responder() -> Arc<Responder> {
        Arc::new(Responder::new(
            Arc::new(NoopBackend),
            UserResolver::new(Arc::new(MemoryStore::new())),
            GenerateOptions::for_bridge(PathBuf::from("cookies.json")),
        ))
    }

    fn bare_config() -> Config {
        Config {
            data_dir: PathBuf::from("/tmp"),
            config_path: PathBuf::from("/tmp/config.toml"),
            ..Config::default()
        }
    }

    #[test]
    fn telegram_disabled_without_token() {
        let config = bare_config();
        let outcome = start_telegram_bot(&config, test_responder());
        assert!(outcome.is_disabled());
    }

    #[test]
    fn telegram_disabled_with_blank_token() {
        let mut config = bare_config();
        config.channels.telegram = Some(TelegramConfig {
            bot_token: "   ".into(),
            ..TelegramConfig::default()
        });
        let outcome = start_telegram_bot(&config, test_responder());
        assert!(outcome.is_disabled());
    }

    #[test]
    fn slack_disabled_without_app_token() {
        let mut config = bare_config();
        config.channels.slack = Some(crate::config::SlackConfig {
            bot_token: "xoxb-something".into(),
            app_token: String::new(),
        });
        let outcome = start_slack_bot(&config, test_responder());
        assert!(outcome.is_disabled());
    }

    #[tokio::test]
    async fn launch_attaches_inside_a_runtime() {
        let outcome = launch("test-noop", async {});
        let handle = match outcome {
            LaunchOutcome::Attached(handle) => handle,
            other => panic!("expected attached launch, got {other:?}"),
        };
        handle.await.expect("noop task");
    }

    #[test]
    fn launch_detaches_outside_a_runtime() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let outcome = launch("test-noop", async move {
            let _ = done_tx.send(());
        });
        assert!(matches!(outcome, LaunchOutcome::Detached));
        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("detached task should run to completion");
    }

    #[test]
    fn disabled_outcome_has_no_join_handle() {
        assert!(LaunchOutcome::Disabled.into_join_handle().is_none());
        assert!(LaunchOutcome::Detached.into_join_handle().is_none());
    }
}
