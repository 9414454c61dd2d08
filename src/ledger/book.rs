//! Ledger access layer
//!
//! Callers never write to a [`LedgerStore`] directly. [`Ledger`] owns the lazy
//! profile creation policy and the optimistic read-modify-write loop used by
//! every single-profile mutation.

use crate::error::{LadderError, Result};
use crate::ledger::profile::{PlayerProfile, StartingKit};
use crate::ledger::record::MatchRecord;
use crate::ledger::store::{LedgerStore, WriteBatch};
use crate::types::MatchId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempts made before a contended write gives up
pub const MAX_WRITE_ATTEMPTS: usize = 8;

/// Shared handle on the ledger store
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    starting_kit: StartingKit,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, starting_kit: StartingKit) -> Self {
        Self {
            store,
            starting_kit,
        }
    }

    pub fn starting_kit(&self) -> StartingKit {
        self.starting_kit
    }

    /// Stored profile, if the player has ever interacted
    pub fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        self.store.profile(player_id)
    }

    /// Stored profile, creating and persisting the default one on first access.
    ///
    /// A new profile has 0 points, Bronze tier, no streak, the configured
    /// starting coins and items, and no daily claim.
    pub fn get_or_create(&self, player_id: &str) -> Result<PlayerProfile> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            if let Some(existing) = self.store.profile(player_id)? {
                return Ok(existing);
            }

            let fresh = PlayerProfile::new(player_id.to_string(), self.starting_kit);
            match self.store.commit(WriteBatch::new().put_profile(fresh)) {
                Ok(()) => {
                    debug!("Created profile for player '{}'", player_id);
                }
                // Someone else created it first; read theirs
                Err(LadderError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        self.store
            .profile(player_id)?
            .ok_or_else(|| LadderError::Internal {
                message: format!("profile {} vanished after creation", player_id),
            })
    }

    /// Read-modify-write one profile, retrying when another writer got there
    /// first. `mutate` may run several times and must not have side effects
    /// outside the profile it is given.
    pub fn update_profile<T, F>(&self, player_id: &str, mut mutate: F) -> Result<(PlayerProfile, T)>
    where
        F: FnMut(&mut PlayerProfile) -> Result<T>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.get_or_create(player_id)?;
            let mut next = current.clone();
            let output = mutate(&mut next)?;

            match self.store.commit(WriteBatch::new().put_profile(next.clone())) {
                Ok(()) => {
                    next.version += 1;
                    return Ok((next, output));
                }
                Err(LadderError::VersionConflict { .. }) => {
                    debug!(
                        "Profile '{}' changed underneath update (attempt {})",
                        player_id, attempt
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Giving up on contended profile '{}'", player_id);
        Err(LadderError::VersionConflict {
            player_id: player_id.to_string(),
            expected: 0,
            found: 0,
        })
    }

    /// Read-modify-write two distinct profiles as one batch
    pub fn update_pair<T, F>(
        &self,
        first_id: &str,
        second_id: &str,
        mut mutate: F,
    ) -> Result<(PlayerProfile, PlayerProfile, T)>
    where
        F: FnMut(&mut PlayerProfile, &mut PlayerProfile) -> Result<T>,
    {
        if first_id == second_id {
            return Err(LadderError::validation("a transfer needs two different players"));
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut first = self.get_or_create(first_id)?;
            let mut second = self.get_or_create(second_id)?;
            let output = mutate(&mut first, &mut second)?;

            let batch = WriteBatch::new()
                .put_profile(first.clone())
                .put_profile(second.clone());
            match self.store.commit(batch) {
                Ok(()) => {
                    first.version += 1;
                    second.version += 1;
                    return Ok((first, second, output));
                }
                Err(LadderError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(LadderError::VersionConflict {
            player_id: first_id.to_string(),
            expected: 0,
            found: 0,
        })
    }

    /// Commit an arbitrary batch
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.store.commit(batch)
    }

    pub fn profiles(&self) -> Result<Vec<PlayerProfile>> {
        self.store.profiles()
    }

    pub fn match_record(&self, match_id: MatchId) -> Result<Option<MatchRecord>> {
        self.store.match_record(match_id)
    }

    pub fn matches(&self) -> Result<Vec<MatchRecord>> {
        self.store.matches()
    }
}
