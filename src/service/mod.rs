//! Service layer for the ranked-room service
//!
//! This module contains the request/response facade over the ranked core,
//! the production application state and its background tasks.

pub mod app;
pub mod health;
pub mod ladder;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use ladder::{
    HistoryEntry, LadderService, LadderStats, QueueUpdate, RankingEntry, SweepReport,
    DEFAULT_HISTORY_LIMIT, DEFAULT_RANKING_LIMIT,
};
