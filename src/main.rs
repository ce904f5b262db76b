//! Survival Match Server - match lifecycle coordinator
//!
//! This is the main entry point for the match server. It:
//! - Loads match rules from the environment
//! - Spawns the match coordinator actor and its timer
//! - Streams presentation notices to the log as JSON

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use survival_match_server::app::AppState;
use survival_match_server::config::Config;
use survival_match_server::services::Notice;
use survival_match_server::util::time::{init_server_time, uptime_secs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Survival Match Server");
    info!(
        tick_ms = config.tick_interval.as_millis() as u64,
        min_participants = config.match_settings.min_participants,
        teams = config.match_settings.teams_enabled,
        "Match settings loaded"
    );

    // Create application state
    let state = AppState::new(config);

    let notices = spawn_notice_logger(state.subscribe_notices());

    shutdown_signal().await;

    state.shutdown().await;
    // Channel closes once the coordinator is gone
    if let Err(err) = notices.await {
        warn!(error = %err, "Notice logger failed");
    }

    info!(uptime_secs = uptime_secs(), "Server shutdown complete");
    Ok(())
}

/// Forward every presentation notice to the log
fn spawn_notice_logger(mut rx: broadcast::Receiver<Notice>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notice) => match serde_json::to_string(&notice) {
                    Ok(json) => info!(target: "notice", "{}", json),
                    Err(err) => warn!(error = %err, "Failed to serialize notice"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Notice logger lagged, skipping {} notices", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Notice channel closed");
                    break;
                }
            }
        }
    })
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
