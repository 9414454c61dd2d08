//! Ranked Room - ranked matchmaking core for small community matches
//!
//! This crate queues players per voice context, splits full queues into
//! balanced 2v2/3v3/4v4 teams, drives each match to a declared result and
//! settles points, streaks, items and coins into an atomically written
//! ledger. Front-end adapters call [`service::LadderService`] and render the
//! [`events::LadderEvent`]s it publishes.

pub mod balance;
pub mod config;
pub mod economy;
pub mod error;
pub mod events;
pub mod ledger;
pub mod matches;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ErrorKind, LadderError, Result};
pub use types::*;

// Re-export key components
pub use balance::{SnakeDraftBalancer, TeamBalancer};
pub use events::{EventPublisher, LadderEvent};
pub use ledger::{Ledger, LedgerStore, MatchRecord, PlayerProfile};
pub use service::{LadderService, QueueUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
