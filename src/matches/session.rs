//! Lifecycle of one formed match
//!
//! ```text
//! Forming -> AwaitingItems -> AwaitingResult -> Settling -> Closed
//!    \             \                \
//!     +-------------+----------------+--> Cancelled
//! ```
//!
//! `Settling` cannot be cancelled: once a result is accepted the session
//! stays there until the ledger batch is durably written.

use crate::error::{LadderError, Result};
use crate::ledger::MatchRecord;
use crate::types::{ItemKind, MatchResult, PlayerId, Team};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Possible states of a match session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchState {
    /// Teams assigned, not yet announced
    Forming,
    /// Players may activate one item each
    AwaitingItems,
    /// Match is being played; waiting for the authority's result
    AwaitingResult,
    /// Result accepted, ledger batch not yet durable
    Settling,
    /// Settled and written (terminal)
    Closed,
    /// Aborted without ledger changes (terminal)
    Cancelled,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Closed | MatchState::Cancelled)
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchState::Forming => "forming",
            MatchState::AwaitingItems => "awaiting items",
            MatchState::AwaitingResult => "awaiting result",
            MatchState::Settling => "settling",
            MatchState::Closed => "closed",
            MatchState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Result accepted by the authority, kept until settlement is durable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub winner: Team,
    pub mvp: Option<PlayerId>,
    pub declared_by: Option<PlayerId>,
    pub declared_at: DateTime<Utc>,
}

/// A match between formation and closure
#[derive(Debug, Clone)]
pub struct MatchSession {
    record: MatchRecord,
    state: MatchState,
    item_deadline: Option<DateTime<Utc>>,
    declaration: Option<Declaration>,
}

impl MatchSession {
    pub fn new(record: MatchRecord) -> Self {
        Self {
            record,
            state: MatchState::Forming,
            item_deadline: None,
            declaration: None,
        }
    }

    /// Session for a pending record found in the ledger at startup. Its item
    /// window is long gone, so it waits for a result.
    pub fn restored(record: MatchRecord) -> Self {
        Self {
            record,
            state: MatchState::AwaitingResult,
            item_deadline: None,
            declaration: None,
        }
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn item_deadline(&self) -> Option<DateTime<Utc>> {
        self.item_deadline
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        self.declaration.as_ref()
    }

    fn invalid(&self, action: &str) -> LadderError {
        LadderError::InvalidTransition {
            match_id: self.record.id,
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }

    /// Forming → AwaitingItems
    pub fn open_items(&mut self, deadline: DateTime<Utc>) -> Result<()> {
        if self.state != MatchState::Forming {
            return Err(self.invalid("open the item window"));
        }
        self.state = MatchState::AwaitingItems;
        self.item_deadline = Some(deadline);
        Ok(())
    }

    /// Validate an item activation without applying it
    pub fn check_item(&self, player_id: &str) -> Result<()> {
        if self.state != MatchState::AwaitingItems {
            return Err(self.invalid("activate an item"));
        }
        if self.record.team_of(player_id).is_none() {
            return Err(LadderError::validation(format!(
                "player {} is not in match {}",
                player_id, self.record.id
            )));
        }
        if let Some(used) = self.record.items_activated.get(player_id) {
            return Err(LadderError::ItemAlreadyActivated {
                player_id: player_id.to_string(),
                match_id: self.record.id,
                item: *used,
            });
        }
        Ok(())
    }

    /// Record copy carrying one more activation
    pub fn record_with_item(&self, player_id: &str, item: ItemKind) -> MatchRecord {
        let mut record = self.record.clone();
        record.items_activated.insert(player_id.to_string(), item);
        record
    }

    /// Adopt a record whose item activation has been persisted
    pub fn confirm_item(&mut self, record: MatchRecord) {
        self.record = record;
    }

    /// AwaitingItems → AwaitingResult
    pub fn start(&mut self) -> Result<()> {
        if self.state != MatchState::AwaitingItems {
            return Err(self.invalid("start"));
        }
        self.state = MatchState::AwaitingResult;
        self.item_deadline = None;
        Ok(())
    }

    pub fn item_window_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == MatchState::AwaitingItems
            && self.item_deadline.map(|d| d <= now).unwrap_or(false)
    }

    /// AwaitingResult → Settling
    pub fn begin_settlement(
        &mut self,
        winner: Team,
        mvp: Option<PlayerId>,
        declared_by: Option<PlayerId>,
    ) -> Result<()> {
        match self.state {
            MatchState::Settling | MatchState::Closed | MatchState::Cancelled => {
                return Err(LadderError::AlreadySettled {
                    match_id: self.record.id,
                })
            }
            MatchState::Forming | MatchState::AwaitingItems => {
                return Err(self.invalid("declare a result"))
            }
            MatchState::AwaitingResult => {}
        }
        if self.record.is_settled() {
            return Err(LadderError::AlreadySettled {
                match_id: self.record.id,
            });
        }

        if let Some(mvp) = &mvp {
            if self.record.team_of(mvp) != Some(winner) {
                return Err(LadderError::validation(format!(
                    "MVP {} is not on the winning team",
                    mvp
                )));
            }
        }

        self.declaration = Some(Declaration {
            winner,
            mvp,
            declared_by,
            declared_at: current_timestamp(),
        });
        self.state = MatchState::Settling;
        Ok(())
    }

    /// Settling → Closed, once the settled record is durable
    pub fn finish(&mut self, settled: MatchRecord) -> Result<()> {
        if self.state != MatchState::Settling {
            return Err(self.invalid("close"));
        }
        self.record = settled;
        self.state = MatchState::Closed;
        Ok(())
    }

    /// Record copy marked cancelled, if cancelling is allowed now
    pub fn cancelled_record(&self) -> Result<MatchRecord> {
        match self.state {
            MatchState::Forming | MatchState::AwaitingItems | MatchState::AwaitingResult => {
                let mut record = self.record.clone();
                record.result = MatchResult::Cancelled;
                Ok(record)
            }
            MatchState::Settling | MatchState::Closed | MatchState::Cancelled => {
                Err(LadderError::AlreadySettled {
                    match_id: self.record.id,
                })
            }
        }
    }

    /// Adopt the persisted cancelled record
    pub fn confirm_cancel(&mut self, record: MatchRecord) {
        self.record = record;
        self.state = MatchState::Cancelled;
        self.item_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TeamSize;
    use chrono::Duration;

    fn session() -> MatchSession {
        let record = MatchRecord::new(
            "vc-1".to_string(),
            TeamSize::Duo,
            vec!["a1".to_string(), "a2".to_string()],
            vec!["b1".to_string(), "b2".to_string()],
        );
        MatchSession::new(record)
    }

    fn playing() -> MatchSession {
        let mut s = session();
        s.open_items(current_timestamp()).unwrap();
        s.start().unwrap();
        s
    }

    #[test]
    fn test_happy_path() {
        let mut s = session();
        assert_eq!(s.state(), MatchState::Forming);

        s.open_items(current_timestamp() + Duration::minutes(2)).unwrap();
        s.check_item("a1").unwrap();
        let record = s.record_with_item("a1", ItemKind::DoubleToken);
        s.confirm_item(record);

        s.start().unwrap();
        s.begin_settlement(Team::A, Some("a1".to_string()), Some("a1".to_string()))
            .unwrap();
        assert_eq!(s.state(), MatchState::Settling);

        let mut settled = s.record().clone();
        settled.result = MatchResult::TeamAWin;
        s.finish(settled).unwrap();
        assert_eq!(s.state(), MatchState::Closed);
        assert!(s.state().is_terminal());
    }

    #[test]
    fn test_one_item_per_player() {
        let mut s = session();
        s.open_items(current_timestamp()).unwrap();
        let record = s.record_with_item("b2", ItemKind::ShieldToken);
        s.confirm_item(record);

        let err = s.check_item("b2").unwrap_err();
        assert!(matches!(
            err,
            LadderError::ItemAlreadyActivated {
                item: ItemKind::ShieldToken,
                ..
            }
        ));
        assert!(matches!(
            s.check_item("zz"),
            Err(LadderError::Validation { .. })
        ));
    }

    #[test]
    fn test_items_closed_after_start() {
        let s = playing();
        assert!(matches!(
            s.check_item("a1"),
            Err(LadderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_result_requires_started_match() {
        let mut s = session();
        s.open_items(current_timestamp()).unwrap();
        let err = s.begin_settlement(Team::A, None, None).unwrap_err();
        assert!(matches!(err, LadderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_second_declaration_rejected() {
        let mut s = playing();
        s.begin_settlement(Team::B, None, None).unwrap();

        let err = s.begin_settlement(Team::A, None, None).unwrap_err();
        assert!(matches!(err, LadderError::AlreadySettled { .. }));
        assert_eq!(s.declaration().unwrap().winner, Team::B);
    }

    #[test]
    fn test_mvp_must_be_on_winning_team() {
        let mut s = playing();
        let err = s
            .begin_settlement(Team::A, Some("b1".to_string()), None)
            .unwrap_err();
        assert!(matches!(err, LadderError::Validation { .. }));
        assert_eq!(s.state(), MatchState::AwaitingResult);
    }

    #[test]
    fn test_cancel_only_before_settling() {
        let mut s = playing();
        let record = s.cancelled_record().unwrap();
        assert_eq!(record.result, MatchResult::Cancelled);
        s.confirm_cancel(record);
        assert_eq!(s.state(), MatchState::Cancelled);
        assert!(s.cancelled_record().is_err());

        let mut s = playing();
        s.begin_settlement(Team::A, None, None).unwrap();
        assert!(matches!(
            s.cancelled_record(),
            Err(LadderError::AlreadySettled { .. })
        ));
    }

    #[test]
    fn test_item_window_expiry() {
        let mut s = session();
        let deadline = current_timestamp();
        s.open_items(deadline).unwrap();

        assert!(!s.item_window_expired(deadline - Duration::seconds(1)));
        assert!(s.item_window_expired(deadline));
        s.start().unwrap();
        assert!(!s.item_window_expired(deadline + Duration::hours(1)));
    }
}
