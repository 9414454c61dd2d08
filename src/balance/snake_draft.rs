//! Snake-draft team balancer
//!
//! Players are ranked by points (highest first, join order breaking ties) and
//! dealt out in the pattern A, B, B, A, A, B, B, A. Each pair of picks hands
//! the weaker pick of one round to the side that lost the stronger pick, which
//! keeps the running point sums close. No exhaustive search is performed, so
//! the split is good but not guaranteed optimal.

use crate::error::{LadderError, Result};
use crate::ledger::PlayerProfile;
use crate::types::{PlayerId, Team};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Two disjoint rosters of equal size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub points_a: i64,
    pub points_b: i64,
}

impl Teams {
    /// Absolute difference of the teams' point totals
    pub fn spread(&self) -> i64 {
        (self.points_a - self.points_b).abs()
    }
}

/// Trait for team balancing algorithms
pub trait TeamBalancer: Send + Sync {
    /// Split `roster` (given in join order) into two teams of `roster.len() / 2`.
    ///
    /// An odd, empty or duplicated roster is a caller bug and is rejected as an
    /// internal error.
    fn balance(&self, roster: &[PlayerProfile]) -> Result<Teams>;
}

/// Deterministic snake-draft balancer
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeDraftBalancer;

impl SnakeDraftBalancer {
    pub fn new() -> Self {
        Self
    }

    /// Side receiving the `pick`-th ranked player
    pub fn side_for_pick(pick: usize) -> Team {
        match pick % 4 {
            0 | 3 => Team::A,
            _ => Team::B,
        }
    }
}

impl TeamBalancer for SnakeDraftBalancer {
    fn balance(&self, roster: &[PlayerProfile]) -> Result<Teams> {
        if roster.is_empty() || roster.len() % 2 != 0 {
            return Err(LadderError::Internal {
                message: format!("cannot balance a roster of {} players", roster.len()),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = roster.iter().find(|p| !seen.insert(p.id.as_str())) {
            return Err(LadderError::Internal {
                message: format!("player {} appears twice in roster", dup.id),
            });
        }

        // Stable sort: equal points keep join order
        let mut ranked: Vec<&PlayerProfile> = roster.iter().collect();
        ranked.sort_by(|a, b| b.points.cmp(&a.points));

        let mut teams = Teams {
            team_a: Vec::with_capacity(roster.len() / 2),
            team_b: Vec::with_capacity(roster.len() / 2),
            points_a: 0,
            points_b: 0,
        };
        for (pick, profile) in ranked.into_iter().enumerate() {
            match Self::side_for_pick(pick) {
                Team::A => {
                    teams.team_a.push(profile.id.clone());
                    teams.points_a += profile.points;
                }
                Team::B => {
                    teams.team_b.push(profile.id.clone());
                    teams.points_b += profile.points;
                }
            }
        }

        Ok(teams)
    }
}
