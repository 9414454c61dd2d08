//! File-backed ledger storage
//!
//! The whole ledger lives in one `ledger.json` snapshot. Every commit
//! serialises the would-be next state and atomically replaces the file; the
//! in-memory copy readers see is swapped only once the file is in place.

use crate::error::{LadderError, Result};
use crate::ledger::profile::PlayerProfile;
use crate::ledger::record::MatchRecord;
use crate::ledger::store::{LedgerState, LedgerStore, WriteBatch};
use crate::types::MatchId;
use crate::utils::write_atomically;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{error, info};

/// Name of the snapshot file inside the data directory
pub const LEDGER_FILE: &str = "ledger.json";

/// JSON snapshot ledger storage
#[derive(Debug)]
pub struct JsonLedgerStore {
    path: PathBuf,
    state: RwLock<LedgerState>,
}

impl JsonLedgerStore {
    /// Open the ledger in `data_dir`, starting empty if no snapshot exists yet
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(LEDGER_FILE);

        let state = if path.exists() {
            let raw = fs::read(&path)?;
            let state: LedgerState = serde_json::from_slice(&raw).map_err(|e| {
                LadderError::Persistence {
                    message: format!("{} is corrupt: {}", path.display(), e),
                }
            })?;
            info!(
                "Loaded ledger from {} - players: {}, matches: {}",
                path.display(),
                state.players.len(),
                state.matches.len()
            );
            state
        } else {
            info!("No ledger at {}, starting empty", path.display());
            LedgerState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonLedgerStore {
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
        // Held across the file write so commits reach disk in the order they
        // were validated.
        let mut state = self
            .state
            .write()
            .map_err(|_| LadderError::lock_poisoned("ledger write"))?;

        let mut next = state.clone();
        next.apply(batch)?;

        let bytes = serde_json::to_vec_pretty(&next)?;
        if let Err(e) = write_atomically(&self.path, &bytes) {
            error!("Failed to write ledger {}: {}", self.path.display(), e);
            return Err(e.into());
        }

        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::profile::StartingKit;
    use crate::types::TeamSize;

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).unwrap();

        let mut profile = PlayerProfile::new("p1".to_string(), StartingKit::default());
        profile.points = 120;
        profile.refresh_tier();
        let record = MatchRecord::new(
            "vc-1".to_string(),
            TeamSize::Duo,
            vec!["p1".to_string(), "p2".to_string()],
            vec!["p3".to_string(), "p4".to_string()],
        );
        store
            .commit(WriteBatch::new().put_profile(profile).put_match(record.clone()))
            .unwrap();

        let reopened = JsonLedgerStore::open(dir.path()).unwrap();
        let loaded = reopened.profile("p1").unwrap().unwrap();
        assert_eq!(loaded.points, 120);
        assert_eq!(loaded.version, 1);
        assert_eq!(reopened.match_record(record.id).unwrap().unwrap(), record);
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLedgerStore::open(dir.path()).unwrap();
        store
            .commit(WriteBatch::new().put_profile(PlayerProfile::new(
                "p1".to_string(),
                StartingKit::default(),
            )))
            .unwrap();

        // A directory squatting on the temp file name makes File::create fail
        fs::create_dir(store.path().with_extension("json.tmp")).unwrap();

        let mut next = store.profile("p1").unwrap().unwrap();
        next.points = 50;
        let err = store.commit(WriteBatch::new().put_profile(next)).unwrap_err();
        assert!(matches!(err, LadderError::Persistence { .. }));

        assert_eq!(store.profile("p1").unwrap().unwrap().points, 0);
        let reopened = JsonLedgerStore::open(dir.path()).unwrap();
        assert_eq!(reopened.profile("p1").unwrap().unwrap().points, 0);
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LEDGER_FILE), b"{not json").unwrap();

        let err = JsonLedgerStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, LadderError::Persistence { .. }));
    }
}
