//! Metrics and monitoring for the ranked-room service
//!
//! This module provides Prometheus metrics collection and the HTTP health
//! endpoints that expose them.

pub mod collector;
pub mod health;

pub use collector::{
    EconomyMetrics, MatchMetrics, MetricsCollector, MetricsTimer, QueueMetrics, ServiceMetrics,
};
pub use health::HealthServer;

use std::sync::Arc;

/// Unified metrics service that combines all monitoring capabilities
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Start the health endpoints; returns when the server stops
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
