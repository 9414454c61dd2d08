//! Main application state and service coordination
//!
//! This module contains the production AppState that owns the ledger, the
//! ranked core, the event fan-out and the background sweep tasks.

use crate::config::{AppConfig, ChannelBindingStore};
use crate::events::{BroadcastEventPublisher, EventEnvelope};
use crate::ledger::{InMemoryLedgerStore, JsonLedgerStore, LedgerStore};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::service::ladder::LadderService;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Ledger error: {message}")]
    Ledger { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// The ranked core every adapter calls into
    service: Arc<LadderService>,

    /// Fan-out of domain events to adapters
    events: Arc<BroadcastEventPublisher>,

    metrics_collector: Arc<MetricsCollector>,

    /// Health endpoints, present while the service runs
    metrics_service: Mutex<Option<Arc<MetricsService>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Open the JSON ledger and channel bindings in the data directory and
    /// wire up the core
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);
        info!(
            "Configuration: data_dir={}, health_port={}, default_size={}",
            config.service.data_dir.display(),
            config.service.health_port,
            config.default_team_size()
        );

        let data_dir = config.service.data_dir.clone();
        let store = JsonLedgerStore::open(&data_dir).map_err(|e| ServiceError::Ledger {
            message: format!("Failed to open ledger in {}: {}", data_dir.display(), e),
        })?;
        let channels =
            ChannelBindingStore::open(&data_dir).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to load channel bindings: {}", e),
            })?;

        Self::assemble(config, Arc::new(store), channels)
    }

    /// State backed by an in-memory ledger, for tests and dry runs
    pub fn in_memory(config: AppConfig) -> Result<Self, ServiceError> {
        Self::assemble(
            config,
            Arc::new(InMemoryLedgerStore::new()),
            ChannelBindingStore::in_memory(),
        )
    }

    fn assemble(
        config: AppConfig,
        store: Arc<dyn LedgerStore>,
        channels: ChannelBindingStore,
    ) -> Result<Self, ServiceError> {
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );
        let events = Arc::new(BroadcastEventPublisher::default());

        let service = LadderService::new(&config, store, events.clone())
            .with_channels(channels)
            .with_metrics(metrics_collector.clone());
        service.restore().map_err(|e| ServiceError::Ledger {
            message: format!("Failed to restore pending matches: {}", e),
        })?;

        Ok(Self {
            config,
            service: Arc::new(service),
            events,
            metrics_collector,
            metrics_service: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the health endpoints and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_background_tasks().await?;

        info!("✅ {} service started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        if let Some(metrics_service) = self.metrics_service.lock().await.take() {
            info!("Stopping metrics service...");
            if let Err(e) = metrics_service.stop().await {
                warn!("Failed to stop metrics service: {}", e);
            } else {
                info!("✅ Metrics service stopped");
            }
        }

        let final_stats = self
            .service
            .stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        if final_stats.matches.active_matches > 0 {
            info!(
                "{} matches remain pending and will be restored on next start",
                final_stats.matches.active_matches
            );
        }
        info!("Final service statistics: {:?}", final_stats);
        info!("✅ {} shutdown completed", self.config.service.name);

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn service(&self) -> Arc<LadderService> {
        self.service.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// New receiver for every domain event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(
            self.metrics_collector.clone(),
            health_server,
        ));
        *self.metrics_service.lock().await = Some(metrics_service.clone());

        let port = self.config.service.health_port;
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.lock().await.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    async fn start_background_tasks(&self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        info!(
            "Starting sweep task ({}s interval)...",
            self.config.sweep_interval().as_secs()
        );
        let sweep_task = {
            let service = self.service.clone();
            let sweep_interval = self.config.sweep_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                info!("Sweep task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match service.sweep(chrono::Utc::now()).await {
                        Ok(report) => {
                            if report.expired_queues.is_empty() && report.started_matches.is_empty()
                            {
                                debug!("Sweep completed - nothing expired");
                            }
                        }
                        Err(e) => warn!("Sweep failed: {}", e),
                    }

                    match service.stats() {
                        Ok(stats) => debug!(
                            "Updated metrics - queues: {}, waiting: {}, matches: {}",
                            stats.queues.active_sessions,
                            stats.queues.players_waiting,
                            stats.matches.active_matches
                        ),
                        Err(e) => warn!("Failed to get stats for metrics update: {}", e),
                    }
                }

                info!("Sweep task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let service = self.service.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = started_at.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    let ledger_ok = service.ledger().profiles().is_ok();
                    let settling = service
                        .matches()
                        .stats()
                        .map(|s| s.settling_matches)
                        .unwrap_or(0);

                    // 2 = healthy, 1 = degraded, 0 = unhealthy
                    let status = match (ledger_ok, settling) {
                        (false, _) => 0,
                        (true, 0) => 2,
                        (true, _) => 1,
                    };
                    metrics_collector.update_health_status(status);
                    metrics_collector.update_component_health("ledger", ledger_ok);
                    metrics_collector.update_component_health("match_manager", settling == 0);
                    metrics_collector.update_component_health("queue_manager", true);

                    debug!(
                        "Updated service health metrics - uptime: {}s, status: {}",
                        uptime_seconds, status
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(sweep_task);
        tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
