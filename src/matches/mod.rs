//! Match Session State Machine
//!
//! This module drives formed matches from team reveal through the item
//! window and result declaration to an atomic ledger settlement.

pub mod authority;
pub mod manager;
pub mod session;
pub mod settlement;

pub use authority::{CaptainAuthority, MatchAction, ResultAuthority};
pub use manager::{MatchManager, MatchSnapshot, MatchStats};
pub use session::{Declaration, MatchSession, MatchState};
pub use settlement::{Settlement, SettlementReport};
