//! Ledger Store: durable player profiles and match history
//!
//! This module holds the ranked data model and every way of persisting it.
//! All writes go through whole-record, all-or-nothing batches.

pub mod book;
pub mod json_store;
pub mod profile;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use book::{Ledger, MAX_WRITE_ATTEMPTS};
pub use json_store::JsonLedgerStore;
pub use profile::{Inventory, PlayerProfile, StartingKit, StreakMedal, Tier};
pub use record::MatchRecord;
pub use store::{InMemoryLedgerStore, LedgerState, LedgerStore, MockLedgerStore, WriteBatch};
