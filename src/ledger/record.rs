//! Match records: the append-only history of formed matches

use crate::types::{ContextId, ItemKind, MatchId, MatchResult, PlayerId, Team, TeamSize};
use crate::utils::{current_timestamp, generate_match_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A formed match. Rosters never change after formation and the whole record
/// is frozen once `result` leaves `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub context_id: ContextId,
    pub team_size: TeamSize,
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub captain_a: PlayerId,
    pub captain_b: PlayerId,
    pub result: MatchResult,
    pub mvp: Option<PlayerId>,
    pub items_activated: BTreeMap<PlayerId, ItemKind>,
    /// Signed point change applied to each participant at settlement
    pub point_deltas: BTreeMap<PlayerId, i64>,
    /// Coins paid to each participant at settlement
    pub currency_deltas: BTreeMap<PlayerId, u64>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// Build a pending record. Captains are the first player of each roster.
    pub fn new(
        context_id: ContextId,
        team_size: TeamSize,
        team_a: Vec<PlayerId>,
        team_b: Vec<PlayerId>,
    ) -> Self {
        let captain_a = team_a.first().cloned().unwrap_or_default();
        let captain_b = team_b.first().cloned().unwrap_or_default();
        Self {
            id: generate_match_id(),
            timestamp: current_timestamp(),
            context_id,
            team_size,
            team_a,
            team_b,
            captain_a,
            captain_b,
            result: MatchResult::Pending,
            mvp: None,
            items_activated: BTreeMap::new(),
            point_deltas: BTreeMap::new(),
            currency_deltas: BTreeMap::new(),
            settled_at: None,
        }
    }

    pub fn roster(&self, team: Team) -> &[PlayerId] {
        match team {
            Team::A => &self.team_a,
            Team::B => &self.team_b,
        }
    }

    pub fn team_of(&self, player_id: &str) -> Option<Team> {
        if self.team_a.iter().any(|p| p == player_id) {
            Some(Team::A)
        } else if self.team_b.iter().any(|p| p == player_id) {
            Some(Team::B)
        } else {
            None
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &PlayerId> {
        self.team_a.iter().chain(self.team_b.iter())
    }

    pub fn is_captain(&self, player_id: &str) -> bool {
        self.captain_a == player_id || self.captain_b == player_id
    }

    pub fn is_settled(&self) -> bool {
        !self.result.is_pending()
    }
}
