//! Bugbot CLI entry point.

use anyhow::Context as _;
use bugbot::bot::Bot;
use bugbot::bug_report::{GitLabTracker, IssueTracker};
use bugbot::config::Config;
use bugbot::messaging::slack::SlackAdapter;
use bugbot::messaging::{Messaging, MessagingDyn};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "bugbot")]
#[command(about = "A Slack bot that files bug reports on an issue tracker")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(cli.debug, cli.log_dir.as_deref());

    // Several dependencies pull rustls; pin the process-wide provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing::info!("starting bugbot");

    let config = if let Some(config_path) = cli.config {
        Config::load_from_path(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::load().with_context(|| "failed to load configuration from environment")?
    };

    tracing::info!(
        tracker = %config.tracker.base_url,
        project_id = %config.tracker.project_id,
        keywords = config.bug_report.keywords.len(),
        "configuration loaded"
    );

    let tracker: Arc<dyn IssueTracker> = Arc::new(
        GitLabTracker::new(&config.tracker).context("failed to build issue tracker client")?,
    );
    let adapter = Arc::new(SlackAdapter::new(
        config.slack.bot_token.clone(),
        config.slack.app_token.clone(),
    )?);

    Messaging::health_check(adapter.as_ref())
        .await
        .context("slack API is unreachable with the configured bot token")?;
    tracing::info!("slack API reachable");

    let messaging: Arc<dyn MessagingDyn> = adapter.clone();
    let bot = Bot::new(messaging, tracker, &config.bug_report)
        .context("failed to build bot routes")?;

    let inbound = Messaging::start(adapter.as_ref())
        .await
        .context("failed to start slack adapter")?;

    tracing::info!("bugbot started");

    tokio::select! {
        _ = bot.run(inbound) => {
            tracing::info!("inbound stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Err(error) = Messaging::shutdown(adapter.as_ref()).await {
        tracing::warn!(%error, "slack adapter did not shut down cleanly");
    }

    tracing::info!("bugbot stopped");
    Ok(())
}

/// Terminal logging, plus a daily rolling file when `log_dir` is set.
fn init_tracing(
    debug: bool,
    log_dir: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let registry = tracing_subscriber::registry()
        .with(build_env_filter(debug))
        .with(tracing_subscriber::fmt::layer().compact());

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "bugbot.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .compact(),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
fn build_env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}
