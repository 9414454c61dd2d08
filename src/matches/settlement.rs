//! Settlement computation: one pending match plus its participants' profiles
//! in, the settled record and every updated profile out

use crate::economy::{Participation, PlayerOutcome, RewardRules};
use crate::error::{LadderError, Result};
use crate::ledger::{MatchRecord, PlayerProfile, WriteBatch};
use crate::types::{MatchResult, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything a settlement writes
#[derive(Debug, Clone)]
pub struct Settlement {
    pub record: MatchRecord,
    pub profiles: Vec<PlayerProfile>,
    pub outcomes: Vec<PlayerOutcome>,
}

impl Settlement {
    /// Compute the settlement of `pending`.
    ///
    /// `profiles` must hold exactly the match participants. The returned
    /// profiles keep the versions they were read at, ready to be committed.
    pub fn compute(
        rules: &RewardRules,
        pending: &MatchRecord,
        winner: Team,
        mvp: Option<&str>,
        profiles: Vec<PlayerProfile>,
        settled_at: DateTime<Utc>,
    ) -> Result<Self> {
        if pending.is_settled() {
            return Err(LadderError::AlreadySettled {
                match_id: pending.id,
            });
        }

        let mut by_id: HashMap<String, PlayerProfile> =
            profiles.into_iter().map(|p| (p.id.clone(), p)).collect();

        let mut record = pending.clone();
        let mut updated = Vec::with_capacity(by_id.len());
        let mut outcomes = Vec::with_capacity(by_id.len());

        for player_id in pending.participants() {
            let mut profile = by_id.remove(player_id).ok_or_else(|| LadderError::Internal {
                message: format!("no profile loaded for participant {}", player_id),
            })?;

            let participation = Participation {
                won: pending.team_of(player_id) == Some(winner),
                mvp: mvp == Some(player_id.as_str()),
                item: pending.items_activated.get(player_id).copied(),
            };
            let outcome = rules.apply(&mut profile, &participation);

            record
                .point_deltas
                .insert(player_id.clone(), outcome.point_delta);
            record
                .currency_deltas
                .insert(player_id.clone(), outcome.currency_delta);
            updated.push(profile);
            outcomes.push(outcome);
        }

        if !by_id.is_empty() {
            return Err(LadderError::Internal {
                message: format!(
                    "{} profiles supplied for players outside match {}",
                    by_id.len(),
                    pending.id
                ),
            });
        }

        record.result = MatchResult::for_winner(winner);
        record.mvp = mvp.map(str::to_string);
        record.settled_at = Some(settled_at);

        Ok(Self {
            record,
            profiles: updated,
            outcomes,
        })
    }

    /// The single all-or-nothing ledger write for this settlement
    pub fn to_batch(&self) -> WriteBatch {
        self.profiles
            .iter()
            .cloned()
            .fold(WriteBatch::new(), WriteBatch::put_profile)
            .put_match(self.record.clone())
    }
}

/// What a settled match reports back to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub record: MatchRecord,
    pub outcomes: Vec<PlayerOutcome>,
}
