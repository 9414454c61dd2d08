//! Queue management for ranked matches
//!
//! One waiting session per context, one membership per player. Full sessions
//! are handed off to match formation in the same step that removes them.

pub mod manager;
pub mod session;

pub use manager::{JoinOutcome, LeaveOutcome, QueueManager, QueueStats};
pub use session::QueueSession;
