//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the ranked-room service using
//! Prometheus metrics.

use crate::matches::MatchStats;
use crate::queue::QueueStats;
use crate::types::{ItemKind, MatchResult, TeamSize};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the ranked-room service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Match-related metrics
    match_metrics: MatchMetrics,

    /// Economy-related metrics
    economy_metrics: EconomyMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total queue joins by team size
    pub joins_total: IntCounterVec,

    /// Total queue leaves
    pub leaves_total: IntCounter,

    /// Sessions that filled and formed a match, by team size
    pub sessions_formed_total: IntCounterVec,

    /// Queues currently waiting
    pub active_queues: IntGauge,

    /// Players currently waiting in a queue
    pub players_waiting: IntGauge,
}

/// Match-related metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches reaching a terminal result, by outcome
    pub matches_finished_total: IntCounterVec,

    /// Settlement writes that failed
    pub settlement_failures_total: IntCounter,

    /// Items activated by kind
    pub items_activated_total: IntCounterVec,

    /// Unsettled matches
    pub active_matches: IntGauge,

    /// Time spent settling a match
    pub settlement_duration: Histogram,
}

/// Economy-related metrics
#[derive(Clone)]
pub struct EconomyMetrics {
    /// Shop and gift operations by kind
    pub transactions_total: IntCounterVec,

    /// Daily claims by reward type
    pub daily_claims_total: IntCounterVec,
}

fn size_label(size: TeamSize) -> &'static str {
    match size {
        TeamSize::Duo => "2v2",
        TeamSize::Trio => "3v3",
        TeamSize::Squad => "4v4",
    }
}

fn item_label(item: ItemKind) -> &'static str {
    match item {
        ItemKind::DoubleToken => "double_token",
        ItemKind::ShieldToken => "shield_token",
    }
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let economy_metrics = EconomyMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            economy_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn economy(&self) -> &EconomyMetrics {
        &self.economy_metrics
    }

    /// Refresh gauges from the managers' current stats
    pub fn update_from_stats(&self, queue: &QueueStats, matches: &MatchStats) {
        self.queue_metrics
            .active_queues
            .set(queue.active_sessions as i64);
        self.queue_metrics
            .players_waiting
            .set(queue.players_waiting as i64);
        self.match_metrics
            .active_matches
            .set(matches.active_matches as i64);
    }

    pub fn record_queue_join(&self, size: TeamSize) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[size_label(size)])
            .inc();
    }

    pub fn record_queue_leave(&self) {
        self.queue_metrics.leaves_total.inc();
    }

    pub fn record_session_formed(&self, size: TeamSize) {
        self.queue_metrics
            .sessions_formed_total
            .with_label_values(&[size_label(size)])
            .inc();
    }

    pub fn record_item_activated(&self, item: ItemKind) {
        self.match_metrics
            .items_activated_total
            .with_label_values(&[item_label(item)])
            .inc();
    }

    /// Record a match reaching a terminal result
    pub fn record_match_finished(&self, result: MatchResult, settlement_time: Option<Duration>) {
        let outcome = match result {
            MatchResult::TeamAWin => "team_a",
            MatchResult::TeamBWin => "team_b",
            MatchResult::Cancelled => "cancelled",
            MatchResult::Pending => "pending",
        };
        self.match_metrics
            .matches_finished_total
            .with_label_values(&[outcome])
            .inc();

        if let Some(duration) = settlement_time {
            self.match_metrics
                .settlement_duration
                .observe(duration.as_secs_f64());
        }
    }

    pub fn record_settlement_failure(&self) {
        self.match_metrics.settlement_failures_total.inc();
    }

    /// Record a shop or gift operation (`buy`, `sell`, `gift`)
    pub fn record_transaction(&self, kind: &str) {
        self.economy_metrics
            .transactions_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn record_daily_claim(&self, reward_type: &str) {
        self.economy_metrics
            .daily_claims_total
            .with_label_values(&[reward_type])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("ranked_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "ranked_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("ranked_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("ranked_room_queue_joins_total", "Total queue joins"),
            &["team_size"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total =
            IntCounter::new("ranked_room_queue_leaves_total", "Total queue leaves")?;
        registry.register(Box::new(leaves_total.clone()))?;

        let sessions_formed_total = IntCounterVec::new(
            Opts::new(
                "ranked_room_sessions_formed_total",
                "Queues that filled and formed a match",
            ),
            &["team_size"],
        )?;
        registry.register(Box::new(sessions_formed_total.clone()))?;

        let active_queues =
            IntGauge::new("ranked_room_active_queues", "Queues currently waiting")?;
        registry.register(Box::new(active_queues.clone()))?;

        let players_waiting = IntGauge::new(
            "ranked_room_players_waiting",
            "Players currently waiting in a queue",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            sessions_formed_total,
            active_queues,
            players_waiting,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_finished_total = IntCounterVec::new(
            Opts::new(
                "ranked_room_matches_finished_total",
                "Matches settled or cancelled",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(matches_finished_total.clone()))?;

        let settlement_failures_total = IntCounter::new(
            "ranked_room_settlement_failures_total",
            "Settlement ledger writes that failed",
        )?;
        registry.register(Box::new(settlement_failures_total.clone()))?;

        let items_activated_total = IntCounterVec::new(
            Opts::new("ranked_room_items_activated_total", "Items activated"),
            &["item"],
        )?;
        registry.register(Box::new(items_activated_total.clone()))?;

        let active_matches =
            IntGauge::new("ranked_room_active_matches", "Unsettled matches")?;
        registry.register(Box::new(active_matches.clone()))?;

        let settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ranked_room_settlement_duration_seconds",
                "Match settlement time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(settlement_duration.clone()))?;

        Ok(Self {
            matches_finished_total,
            settlement_failures_total,
            items_activated_total,
            active_matches,
            settlement_duration,
        })
    }
}

impl EconomyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let transactions_total = IntCounterVec::new(
            Opts::new(
                "ranked_room_transactions_total",
                "Shop and gift operations",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let daily_claims_total = IntCounterVec::new(
            Opts::new("ranked_room_daily_claims_total", "Daily rewards claimed"),
            &["reward"],
        )?;
        registry.register(Box::new(daily_claims_total.clone()))?;

        Ok(Self {
            transactions_total,
            daily_claims_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _queue = collector.queue();
        let _matches = collector.matches();
        let _economy = collector.economy();
    }

    #[test]
    fn test_recording_updates_counters() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_queue_join(TeamSize::Trio);
        collector.record_queue_join(TeamSize::Trio);
        collector.record_session_formed(TeamSize::Trio);
        collector.record_item_activated(ItemKind::ShieldToken);
        collector.record_match_finished(MatchResult::TeamAWin, Some(Duration::from_millis(3)));
        collector.record_transaction("buy");

        assert_eq!(
            collector
                .queue()
                .joins_total
                .with_label_values(&["3v3"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .matches()
                .items_activated_total
                .with_label_values(&["shield_token"])
                .get(),
            1
        );
        assert_eq!(collector.matches().settlement_duration.get_sample_count(), 1);
    }

    #[test]
    fn test_gauges_follow_stats() {
        let collector = MetricsCollector::new().unwrap();
        let queue = QueueStats {
            active_sessions: 2,
            players_waiting: 5,
            ..QueueStats::default()
        };
        let matches = MatchStats {
            active_matches: 3,
            ..MatchStats::default()
        };

        collector.update_from_stats(&queue, &matches);
        assert_eq!(collector.queue().players_waiting.get(), 5);
        assert_eq!(collector.matches().active_matches.get(), 3);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().unwrap();
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
