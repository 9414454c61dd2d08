//! Ledger storage interface and implementations
//!
//! This module defines the narrow interface every ledger backend implements:
//! whole-record reads plus one all-or-nothing [`WriteBatch`] commit. Profile
//! writes carry the version they were read at, so concurrent read-modify-write
//! cycles on the same profile conflict instead of overwriting each other.

use crate::error::{LadderError, Result};
use crate::ledger::profile::PlayerProfile;
use crate::ledger::record::MatchRecord;
use crate::types::{MatchId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// A group of record writes applied together or not at all
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Profiles to store; each `version` is the version the writer read
    pub profiles: Vec<PlayerProfile>,
    /// Match records to insert or replace (pending records only)
    pub matches: Vec<MatchRecord>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_profile(mut self, profile: PlayerProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn put_match(mut self, record: MatchRecord) -> Self {
        self.matches.push(record);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty() && self.matches.is_empty()
    }
}

/// Full ledger contents, as persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub players: BTreeMap<PlayerId, PlayerProfile>,
    /// Ordered by formation
    pub matches: Vec<MatchRecord>,
}

impl LedgerState {
    /// Check every precondition of `batch`, then apply all of it.
    ///
    /// Nothing is modified when a check fails.
    pub fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        for profile in &batch.profiles {
            let found = self
                .players
                .get(&profile.id)
                .map(|stored| stored.version)
                .unwrap_or(0);
            if found != profile.version {
                return Err(LadderError::VersionConflict {
                    player_id: profile.id.clone(),
                    expected: profile.version,
                    found,
                });
            }
        }

        for record in &batch.matches {
            if let Some(stored) = self.matches.iter().find(|m| m.id == record.id) {
                if stored.is_settled() {
                    return Err(LadderError::AlreadySettled {
                        match_id: record.id,
                    });
                }
            }
        }

        for mut profile in batch.profiles {
            profile.version += 1;
            self.players.insert(profile.id.clone(), profile);
        }

        for record in batch.matches {
            match self.matches.iter_mut().find(|m| m.id == record.id) {
                Some(slot) => *slot = record,
                None => self.matches.push(record),
            }
        }

        Ok(())
    }
}

/// Trait for ledger storage operations
pub trait LedgerStore: Send + Sync {
    /// Get a player's profile
    fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>>;

    /// Get every stored profile
    fn profiles(&self) -> Result<Vec<PlayerProfile>>;

    /// Get a match record
    fn match_record(&self, match_id: MatchId) -> Result<Option<MatchRecord>>;

    /// Get all match records in formation order
    fn matches(&self) -> Result<Vec<MatchRecord>>;

    /// Apply a batch atomically
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// In-memory ledger storage implementation
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        let state = self
            .state
            .read()
            .map_err(|_| LadderError::lock_poisoned("ledger read"))?;
        Ok(state.players.get(player_id).cloned())
    }

    fn profiles(&self) -> Result<Vec<PlayerProfile>> {
        let state = self
            .state
            .read()
            .map_err(|_| LadderError::lock_poisoned("ledger read"))?;
        Ok(state.players.values().cloned().collect())
    }

    fn match_record(&self, match_id: MatchId) -> Result<Option<MatchRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| LadderError::lock_poisoned("ledger read"))?;
        Ok(state.matches.iter().find(|m| m.id == match_id).cloned())
    }

    fn matches(&self) -> Result<Vec<MatchRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| LadderError::lock_poisoned("ledger read"))?;
        Ok(state.matches.clone())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LadderError::lock_poisoned("ledger write"))?;
        debug!(
            "Committing batch - profiles: {}, matches: {}",
            batch.profiles.len(),
            batch.matches.len()
        );
        state.apply(batch)
    }
}

/// Mock ledger storage for testing
///
/// Behaves like [`InMemoryLedgerStore`] but records every commit attempt and
/// can be told to fail upcoming commits as if the disk write had faulted.
#[derive(Debug, Default)]
pub struct MockLedgerStore {
    inner: InMemoryLedgerStore,
    failures_remaining: AtomicUsize,
    commit_calls: Mutex<Vec<WriteBatch>>,
}

impl MockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` commits with a persistence error
    pub fn fail_next_commits(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Get all commit attempts made (for testing)
    pub fn get_commit_calls(&self) -> Vec<WriteBatch> {
        self.commit_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl LedgerStore for MockLedgerStore {
    fn profile(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        self.inner.profile(player_id)
    }

    fn profiles(&self) -> Result<Vec<PlayerProfile>> {
        self.inner.profiles()
    }

    fn match_record(&self, match_id: MatchId) -> Result<Option<MatchRecord>> {
        self.inner.match_record(match_id)
    }

    fn matches(&self) -> Result<Vec<MatchRecord>> {
        self.inner.matches()
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if let Ok(mut calls) = self.commit_calls.lock() {
            calls.push(batch.clone());
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(LadderError::Persistence {
                message: "simulated disk fault".to_string(),
            });
        }

        self.inner.commit(batch)
    }
}
