//! Main entry point for the Ranked Room service
//!
//! This is the production entry point that opens the ledger, runs the ranked
//! core with its sweep task and health endpoints, logs every domain event and
//! shuts down gracefully on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use ranked_room::config::{validate_config, AppConfig};
use ranked_room::events::EventEnvelope;
use ranked_room::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Ranked Room - ranked 2v2/3v3/4v4 matchmaking with a persistent ladder
#[derive(Parser)]
#[command(
    name = "ranked-room",
    version,
    about = "Ranked matchmaking core: queues, balanced teams, match settlement and ladder economy",
    long_about = "Ranked Room queues community members per voice context, splits full queues into \
                 balanced teams with a snake draft, drives each match from item activation to a \
                 declared result and settles points, streak medals, items and coins into an \
                 atomically written JSON ledger."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Data directory override
    #[arg(long, value_name = "DIR", help = "Directory holding ledger.json and channels.json")]
    data_dir: Option<PathBuf>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health/metrics server port")]
    health_port: Option<u16>,

    /// Item window override
    #[arg(long, value_name = "SECONDS", help = "Seconds players get to activate items")]
    item_window: Option<u64>,

    /// Moderator ids, may be repeated
    #[arg(long = "moderator", value_name = "PLAYER_ID")]
    moderators: Vec<String>,

    /// Allow points below zero
    #[arg(long, help = "Let losses take points below zero")]
    allow_negative_points: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = Arc::new(AppState::new(config).await?);
    app_state.start().await?;

    let outcome = HealthCheck::check(app_state.clone()).await;
    app_state.shutdown().await?;

    match outcome {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            println!("  Waiting Queues: {}", health.stats.active_queues);
            println!("  Players Waiting: {}", health.stats.players_waiting);
            println!("  Active Matches: {}", health.stats.active_matches);
            println!("  Stuck Settlements: {}", health.stats.settling_matches);
            println!("  Registered Players: {}", health.stats.registered_players);

            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// The `logs` adapter: write every domain event to the log
async fn event_log_task(app_state: Arc<AppState>) {
    let mut events = app_state.subscribe();

    loop {
        match events.recv().await {
            Ok(envelope) => log_event(&envelope),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event log fell behind, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(envelope: &EventEnvelope) {
    match serde_json::to_string(&envelope.event) {
        Ok(json) => info!(
            topic = %envelope.topic,
            correlation_id = %envelope.correlation_id,
            "{}",
            json
        ),
        Err(e) => warn!(
            "Failed to render {} event: {}",
            envelope.event.event_type(),
            e
        ),
    }
}

/// Run periodic health checks
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} waiting queues, {} active matches",
                    health.status, health.stats.active_queues, health.stats.active_matches
                );
                if health.stats.settling_matches > 0 {
                    warn!(
                        "{} matches failed to settle and need a retry",
                        health.stats.settling_matches
                    );
                }
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Ranked Room Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Data dir: {}", config.service.data_dir.display());
    info!("   Default size: {}", config.default_team_size());
    info!("   Item window: {}s", config.matches.item_window_seconds);
    info!("   Moderators: {}", config.matches.moderators.len());
    info!(
        "   Negative points: {}",
        config.economy.allow_negative_points
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file/environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(data_dir) = &args.data_dir {
        config.service.data_dir = data_dir.clone();
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    if let Some(seconds) = args.item_window {
        config.matches.item_window_seconds = seconds;
    }

    config
        .matches
        .moderators
        .extend(args.moderators.iter().cloned());

    if args.allow_negative_points {
        config.economy.allow_negative_points = true;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let event_task = tokio::spawn(event_log_task(app_state.clone()));

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.clone()));

    info!("✅ Ranked Room Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown finished with an error: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    event_task.abort();
    info!("🛑 Ranked Room Service stopped");
    Ok(())
}
