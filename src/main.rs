#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use botbridge::backend::{GenerateOptions, HttpBackend};
use botbridge::identity::UserResolver;
use botbridge::orchestrator::Responder;
use botbridge::runtime::{self, LaunchOutcome};
use botbridge::store::MemoryStore;
use botbridge::Config;

/// botbridge - Telegram and Slack front ends for one AI backend.
#[derive(Parser, Debug)]
#[command(name = "botbridge")]
#[command(version = "0.1.0")]
#[command(about = "Chat platform bots for a shared AI backend.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start every configured bot and run until interrupted
    Start,
    /// Check connectivity of the backend and each configured channel
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Both reqwest and tokio-tungstenite link rustls; pick one provider
    // process-wide before either stack opens a connection.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Start => start(config).await,
        Commands::Doctor => {
            let backend = HttpBackend::new(
                config.backend.base_url.clone(),
                config.backend.api_key.clone(),
            );
            runtime::doctor(&config, &backend).await;
            Ok(())
        }
    }
}

fn build_responder(config: &Config) -> Arc<Responder> {
    let backend = Arc::new(HttpBackend::new(
        config.backend.base_url.clone(),
        config.backend.api_key.clone(),
    ));
    let resolver = UserResolver::new(Arc::new(MemoryStore::new()));
    let opts = GenerateOptions::for_bridge(config.cookies_file());
    Arc::new(Responder::new(backend, resolver, opts))
}

async fn start(config: Config) -> Result<()> {
    let responder = build_responder(&config);
    let outcomes = runtime::start_bots(&config, responder);

    if outcomes.iter().all(LaunchOutcome::is_disabled) {
        tracing::info!("No bot tokens configured; nothing to run");
        return Ok(());
    }

    println!("botbridge running. Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    let handles: Vec<_> = outcomes
        .into_iter()
        .filter_map(LaunchOutcome::into_join_handle)
        .collect();
    for handle in &handles {
        handle.abort();
    }
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
