//! Match manager: every formed match until it closes
//!
//! Each session sits behind its own mutex, so declaring a result is a
//! check-and-set on that one match while other matches proceed untouched.
//! The table lock is only held to look sessions up, register or remove them;
//! it is never waited on while a session lock is held by the same caller
//! except when removing a finished session.

use crate::balance::Teams;
use crate::economy::RewardRules;
use crate::error::{LadderError, Result};
use crate::ledger::{Ledger, MatchRecord, PlayerProfile, WriteBatch, MAX_WRITE_ATTEMPTS};
use crate::matches::authority::{MatchAction, ResultAuthority};
use crate::matches::session::{MatchSession, MatchState};
use crate::matches::settlement::{Settlement, SettlementReport};
use crate::types::{ContextId, ItemKind, MatchId, PlayerId, Team, TeamSize};
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Statistics about match manager operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub matches_formed: u64,
    pub matches_started: u64,
    pub matches_settled: u64,
    pub matches_cancelled: u64,
    pub items_activated: u64,
    pub settlement_failures: u64,
    /// Current number of unsettled matches
    pub active_matches: usize,
    /// Sessions stuck in `Settling` after a failed write
    pub settling_matches: usize,
}

/// Read-only view of a live match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub record: MatchRecord,
    pub state: MatchState,
    pub item_deadline: Option<DateTime<Utc>>,
}

type SharedSession = Arc<Mutex<MatchSession>>;

#[derive(Default)]
struct MatchTable {
    sessions: HashMap<MatchId, SharedSession>,
    /// Players in an unsettled match
    active_players: HashMap<PlayerId, MatchId>,
    stats: MatchStats,
}

/// Owner of all live match sessions
pub struct MatchManager {
    table: RwLock<MatchTable>,
    ledger: Ledger,
    rules: RewardRules,
    authority: Arc<dyn ResultAuthority>,
    item_window: Duration,
}

impl MatchManager {
    pub fn new(
        ledger: Ledger,
        rules: RewardRules,
        authority: Arc<dyn ResultAuthority>,
        item_window: Duration,
    ) -> Self {
        Self {
            table: RwLock::new(MatchTable::default()),
            ledger,
            rules,
            authority,
            item_window,
        }
    }

    pub fn authority(&self) -> &Arc<dyn ResultAuthority> {
        &self.authority
    }

    fn read_table(&self) -> Result<std::sync::RwLockReadGuard<'_, MatchTable>> {
        self.table
            .read()
            .map_err(|_| LadderError::lock_poisoned("match table"))
    }

    fn write_table(&self) -> Result<std::sync::RwLockWriteGuard<'_, MatchTable>> {
        self.table
            .write()
            .map_err(|_| LadderError::lock_poisoned("match table"))
    }

    fn lock(session: &SharedSession) -> Result<MutexGuard<'_, MatchSession>> {
        session
            .lock()
            .map_err(|_| LadderError::lock_poisoned("match session"))
    }

    /// Live session, or the error explaining why there is none
    fn session(&self, match_id: MatchId) -> Result<SharedSession> {
        if let Some(session) = self.read_table()?.sessions.get(&match_id) {
            return Ok(session.clone());
        }

        match self.ledger.match_record(match_id)? {
            Some(record) if record.is_settled() => Err(LadderError::AlreadySettled { match_id }),
            _ => Err(LadderError::NotFound {
                what: format!("match {}", match_id),
            }),
        }
    }

    fn authorize(
        &self,
        record: &MatchRecord,
        actor: Option<&str>,
        action: MatchAction,
    ) -> Result<()> {
        match actor {
            Some(actor) if !self.authority.may_manage(record, actor, action) => {
                Err(LadderError::PermissionDenied {
                    player_id: actor.to_string(),
                    action: format!("{} match {}", action, record.id),
                })
            }
            _ => Ok(()),
        }
    }

    /// Drop a terminal session and free its players
    fn retire(&self, record: &MatchRecord) -> Result<()> {
        let mut table = self.write_table()?;
        table.sessions.remove(&record.id);
        for player in record.participants() {
            if table.active_players.get(player) == Some(&record.id) {
                table.active_players.remove(player);
            }
        }
        Ok(())
    }

    /// Create and persist the pending record for two balanced teams, then
    /// open its item window
    pub fn form_match(&self, context_id: ContextId, size: TeamSize, teams: Teams) -> Result<MatchRecord> {
        if teams.team_a.len() != size.per_team() || teams.team_b.len() != size.per_team() {
            return Err(LadderError::Internal {
                message: format!(
                    "teams of {} and {} players cannot form a {} match",
                    teams.team_a.len(),
                    teams.team_b.len(),
                    size
                ),
            });
        }

        Self::check_free(&*self.read_table()?, teams.team_a.iter().chain(teams.team_b.iter()))?;

        let record = MatchRecord::new(context_id, size, teams.team_a, teams.team_b);
        let mut session = MatchSession::new(record.clone());
        session.open_items(current_timestamp() + self.item_window)?;

        // Written without the table lock; players are checked again below
        self.ledger.commit(WriteBatch::new().put_match(record.clone()))?;

        let mut table = self.write_table()?;
        if let Err(e) = Self::check_free(&table, record.participants()) {
            drop(table);
            warn!("Match {} lost a player to another match while forming", record.id);
            let voided = session
                .cancelled_record()
                .and_then(|cancelled| self.ledger.commit(WriteBatch::new().put_match(cancelled)));
            if let Err(write) = voided {
                error!("Failed to void match {}: {}", record.id, write);
            }
            return Err(e);
        }

        for player in record.participants() {
            table.active_players.insert(player.clone(), record.id);
        }
        table
            .sessions
            .insert(record.id, Arc::new(Mutex::new(session)));
        table.stats.matches_formed += 1;
        drop(table);

        info!(
            "Formed {} match {} in context '{}': A={:?} B={:?}",
            size, record.id, record.context_id, record.team_a, record.team_b
        );
        Ok(record)
    }

    fn check_free<'a>(
        table: &MatchTable,
        players: impl IntoIterator<Item = &'a PlayerId>,
    ) -> Result<()> {
        for player in players {
            if let Some(match_id) = table.active_players.get(player) {
                return Err(LadderError::AlreadyInMatch {
                    player_id: player.clone(),
                    match_id: *match_id,
                });
            }
        }
        Ok(())
    }

    /// Consume one owned item and attach it to the match, as one ledger write
    pub fn activate_item(
        &self,
        match_id: MatchId,
        player_id: &str,
        item: ItemKind,
    ) -> Result<(MatchRecord, PlayerProfile)> {
        let shared = self.session(match_id)?;
        let mut session = Self::lock(&shared)?;
        session.check_item(player_id)?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut profile = self.ledger.get_or_create(player_id)?;
            profile.take_item(item, 1)?;
            let record = session.record_with_item(player_id, item);

            let batch = WriteBatch::new()
                .put_profile(profile.clone())
                .put_match(record.clone());
            match self.ledger.commit(batch) {
                Ok(()) => {
                    profile.version += 1;
                    session.confirm_item(record.clone());
                    drop(session);
                    self.write_table()?.stats.items_activated += 1;
                    info!(
                        "Player '{}' activated {} in match {}",
                        player_id, item, match_id
                    );
                    return Ok((record, profile));
                }
                Err(LadderError::VersionConflict { .. }) => {
                    debug!(
                        "Profile '{}' changed during item activation (attempt {})",
                        player_id, attempt
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(LadderError::VersionConflict {
            player_id: player_id.to_string(),
            expected: 0,
            found: 0,
        })
    }

    /// Close the item window. `actor` is `None` when the window timed out.
    pub fn start_match(&self, match_id: MatchId, actor: Option<&str>) -> Result<MatchRecord> {
        let shared = self.session(match_id)?;
        let mut session = Self::lock(&shared)?;
        self.authorize(session.record(), actor, MatchAction::Start)?;
        session.start()?;
        let record = session.record().clone();
        drop(session);

        self.write_table()?.stats.matches_started += 1;
        info!(
            "Match {} started by {}",
            match_id,
            actor.unwrap_or("item window timeout")
        );
        Ok(record)
    }

    /// Start every match whose item window has passed
    pub fn expire_item_windows(&self, now: DateTime<Utc>) -> Result<Vec<MatchRecord>> {
        let candidates: Vec<SharedSession> = self.read_table()?.sessions.values().cloned().collect();

        let mut started = Vec::new();
        for shared in candidates {
            let mut session = Self::lock(&shared)?;
            if session.item_window_expired(now) {
                session.start()?;
                debug!("Item window of match {} expired", session.record().id);
                started.push(session.record().clone());
            }
        }

        if !started.is_empty() {
            self.write_table()?.stats.matches_started += started.len() as u64;
        }
        Ok(started)
    }

    /// Accept a result and settle the match.
    ///
    /// Only one declaration per match can succeed; later ones fail with
    /// `AlreadySettled`. When the ledger write fails the match stays in
    /// `Settling` and can be retried with [`MatchManager::retry_settlement`].
    pub fn declare_result(
        &self,
        match_id: MatchId,
        actor: Option<&str>,
        winner: Team,
        mvp: Option<PlayerId>,
    ) -> Result<SettlementReport> {
        let shared = self.session(match_id)?;
        let mut session = Self::lock(&shared)?;
        self.authorize(session.record(), actor, MatchAction::Declare)?;
        session.begin_settlement(winner, mvp, actor.map(str::to_string))?;
        info!(
            "Result declared for match {}: team {:?} wins",
            match_id, winner
        );

        self.settle(session)
    }

    /// Re-run the ledger write of a match stuck in `Settling`
    pub fn retry_settlement(&self, match_id: MatchId, actor: Option<&str>) -> Result<SettlementReport> {
        let shared = self.session(match_id)?;
        let session = Self::lock(&shared)?;
        self.authorize(session.record(), actor, MatchAction::Declare)?;
        if session.state() != MatchState::Settling {
            return Err(LadderError::InvalidTransition {
                match_id,
                action: "retry settlement".to_string(),
                state: session.state().to_string(),
            });
        }

        info!("Retrying settlement of match {}", match_id);
        self.settle(session)
    }

    fn settle(&self, mut session: MutexGuard<'_, MatchSession>) -> Result<SettlementReport> {
        let declaration = session.declaration().cloned().ok_or_else(|| LadderError::Internal {
            message: format!("match {} is settling without a result", session.record().id),
        })?;
        let pending = session.record().clone();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let profiles = pending
                .participants()
                .map(|id| self.ledger.get_or_create(id))
                .collect::<Result<Vec<_>>>()?;

            let settlement = Settlement::compute(
                &self.rules,
                &pending,
                declaration.winner,
                declaration.mvp.as_deref(),
                profiles,
                current_timestamp(),
            )?;

            match self.ledger.commit(settlement.to_batch()) {
                Ok(()) => {
                    session.finish(settlement.record.clone())?;
                    drop(session);

                    self.retire(&settlement.record)?;
                    self.write_table()?.stats.matches_settled += 1;
                    info!(
                        "Match {} settled: {} (mvp: {:?})",
                        settlement.record.id, settlement.record.result, settlement.record.mvp
                    );
                    return Ok(SettlementReport {
                        record: settlement.record,
                        outcomes: settlement.outcomes,
                    });
                }
                Err(LadderError::VersionConflict { player_id, .. }) => {
                    debug!(
                        "Profile '{}' changed during settlement of {} (attempt {})",
                        player_id, pending.id, attempt
                    );
                }
                Err(e) => {
                    drop(session);
                    if let Ok(mut table) = self.write_table() {
                        table.stats.settlement_failures += 1;
                    }
                    error!(
                        "Settlement of match {} failed, match stays settling: {}",
                        pending.id, e
                    );
                    return Err(e);
                }
            }
        }

        drop(session);
        if let Ok(mut table) = self.write_table() {
            table.stats.settlement_failures += 1;
        }
        warn!("Settlement of match {} kept conflicting", pending.id);
        Err(LadderError::VersionConflict {
            player_id: pending.captain_a.clone(),
            expected: 0,
            found: 0,
        })
    }

    /// Abort a match before settlement. Consumed items are not returned.
    pub fn cancel_match(&self, match_id: MatchId, actor: Option<&str>) -> Result<MatchRecord> {
        let shared = self.session(match_id)?;
        let mut session = Self::lock(&shared)?;
        self.authorize(session.record(), actor, MatchAction::Cancel)?;

        let record = session.cancelled_record()?;
        self.ledger.commit(WriteBatch::new().put_match(record.clone()))?;
        session.confirm_cancel(record.clone());
        drop(session);

        self.retire(&record)?;
        self.write_table()?.stats.matches_cancelled += 1;
        info!(
            "Match {} cancelled by {}",
            match_id,
            actor.unwrap_or("system")
        );
        Ok(record)
    }

    /// Re-register every pending match in the ledger, waiting for a result.
    /// Returns how many sessions were restored.
    pub fn restore_pending(&self) -> Result<usize> {
        let pending: Vec<MatchRecord> = self
            .ledger
            .matches()?
            .into_iter()
            .filter(|m| !m.is_settled())
            .collect();

        let mut table = self.write_table()?;
        let mut restored = 0;
        for record in pending {
            if table.sessions.contains_key(&record.id) {
                continue;
            }
            for player in record.participants() {
                table.active_players.insert(player.clone(), record.id);
            }
            info!("Restored pending match {}", record.id);
            table
                .sessions
                .insert(record.id, Arc::new(Mutex::new(MatchSession::restored(record))));
            restored += 1;
        }
        Ok(restored)
    }

    /// Unsettled match the player is part of
    pub fn active_match_of(&self, player_id: &str) -> Result<Option<MatchId>> {
        Ok(self.read_table()?.active_players.get(player_id).copied())
    }

    pub fn match_info(&self, match_id: MatchId) -> Result<Option<MatchSnapshot>> {
        let Some(shared) = self.read_table()?.sessions.get(&match_id).cloned() else {
            return Ok(None);
        };
        let session = Self::lock(&shared)?;
        Ok(Some(MatchSnapshot {
            record: session.record().clone(),
            state: session.state(),
            item_deadline: session.item_deadline(),
        }))
    }

    pub fn stats(&self) -> Result<MatchStats> {
        let sessions: Vec<SharedSession> = {
            let table = self.read_table()?;
            table.sessions.values().cloned().collect()
        };
        let mut settling = 0;
        for shared in &sessions {
            if Self::lock(shared)?.state() == MatchState::Settling {
                settling += 1;
            }
        }

        let mut stats = self.read_table()?.stats.clone();
        stats.active_matches = sessions.len();
        stats.settling_matches = settling;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryLedgerStore, MockLedgerStore, StartingKit};
    use crate::matches::authority::{CaptainAuthority, MockResultAuthority};
    use crate::types::MatchResult;

    fn teams() -> Teams {
        Teams {
            team_a: vec!["a1".to_string(), "a2".to_string()],
            team_b: vec!["b1".to_string(), "b2".to_string()],
            points_a: 0,
            points_b: 0,
        }
    }

    fn manager_with(store: Arc<dyn crate::ledger::LedgerStore>) -> (MatchManager, Ledger) {
        let ledger = Ledger::new(store, StartingKit::default());
        let manager = MatchManager::new(
            ledger.clone(),
            RewardRules::default(),
            Arc::new(CaptainAuthority::new(["mod"])),
            Duration::minutes(2),
        );
        (manager, ledger)
    }

    fn manager() -> (MatchManager, Ledger) {
        manager_with(Arc::new(InMemoryLedgerStore::new()))
    }

    fn started(manager: &MatchManager) -> MatchId {
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();
        manager.start_match(record.id, Some("a1")).unwrap();
        record.id
    }

    #[test]
    fn test_form_match_persists_pending_record() {
        let (manager, ledger) = manager();
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        let stored = ledger.match_record(record.id).unwrap().unwrap();
        assert_eq!(stored.result, MatchResult::Pending);
        assert_eq!(manager.active_match_of("b2").unwrap(), Some(record.id));

        let info = manager.match_info(record.id).unwrap().unwrap();
        assert_eq!(info.state, MatchState::AwaitingItems);
        assert!(info.item_deadline.is_some());
    }

    #[test]
    fn test_player_in_one_unsettled_match() {
        let (manager, _) = manager();
        manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        let err = manager
            .form_match("vc-2".to_string(), TeamSize::Duo, teams())
            .unwrap_err();
        assert!(matches!(err, LadderError::AlreadyInMatch { .. }));
    }

    #[test]
    fn test_racing_formations_register_one_match() {
        let (manager, ledger) = manager();
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let manager = &manager;
                    scope.spawn(move || {
                        manager.form_match(format!("vc-{}", i), TeamSize::Duo, teams())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let formed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(formed.len(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, LadderError::AlreadyInMatch { .. }));
        }
        assert_eq!(manager.stats().unwrap().active_matches, 1);
        assert_eq!(manager.active_match_of("a1").unwrap(), Some(formed[0].id));

        // Records written by a losing formation are voided
        for stored in ledger.matches().unwrap() {
            let expected = if stored.id == formed[0].id {
                MatchResult::Pending
            } else {
                MatchResult::Cancelled
            };
            assert_eq!(stored.result, expected);
        }
    }

    #[test]
    fn test_failed_formation_write_registers_nothing() {
        let store = Arc::new(MockLedgerStore::new());
        let (manager, ledger) = manager_with(store.clone());

        store.fail_next_commits(1);
        assert!(manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .is_err());
        assert_eq!(manager.active_match_of("a1").unwrap(), None);
        assert!(ledger.matches().unwrap().is_empty());

        manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();
        assert_eq!(manager.stats().unwrap().matches_formed, 1);
    }

    #[test]
    fn test_item_activation_consumes_inventory() {
        let (manager, ledger) = manager();
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        let (updated, profile) = manager
            .activate_item(record.id, "a2", ItemKind::ShieldToken)
            .unwrap();
        assert_eq!(updated.items_activated["a2"], ItemKind::ShieldToken);
        assert_eq!(profile.inventory.shield_tokens, 0);
        assert_eq!(ledger.profile("a2").unwrap().unwrap(), profile);
        assert_eq!(
            ledger.match_record(record.id).unwrap().unwrap().items_activated["a2"],
            ItemKind::ShieldToken
        );

        let err = manager
            .activate_item(record.id, "a2", ItemKind::DoubleToken)
            .unwrap_err();
        assert!(matches!(err, LadderError::ItemAlreadyActivated { .. }));
    }

    #[test]
    fn test_item_without_inventory_rejected() {
        let (manager, ledger) = manager();
        ledger
            .update_profile("b1", |p| p.take_item(ItemKind::DoubleToken, 1))
            .unwrap();
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        let err = manager
            .activate_item(record.id, "b1", ItemKind::DoubleToken)
            .unwrap_err();
        assert!(matches!(err, LadderError::InsufficientInventory { .. }));
        assert!(ledger
            .match_record(record.id)
            .unwrap()
            .unwrap()
            .items_activated
            .is_empty());
    }

    #[test]
    fn test_declare_settles_and_closes() {
        let (manager, ledger) = manager();
        let match_id = started(&manager);

        let report = manager
            .declare_result(match_id, Some("b1"), Team::B, Some("b2".to_string()))
            .unwrap();
        assert_eq!(report.record.result, MatchResult::TeamBWin);
        assert_eq!(report.outcomes.len(), 4);

        assert_eq!(ledger.profile("b2").unwrap().unwrap().points, 75);
        assert_eq!(ledger.profile("a1").unwrap().unwrap().points, 0);
        assert!(manager.match_info(match_id).unwrap().is_none());
        assert!(manager.active_match_of("a1").unwrap().is_none());
    }

    #[test]
    fn test_second_declaration_fails_and_ledger_unchanged() {
        let (manager, ledger) = manager();
        let match_id = started(&manager);
        manager
            .declare_result(match_id, Some("a1"), Team::A, None)
            .unwrap();
        let snapshot = ledger.profiles().unwrap();

        let err = manager
            .declare_result(match_id, Some("b1"), Team::B, None)
            .unwrap_err();
        assert!(matches!(err, LadderError::AlreadySettled { .. }));
        assert_eq!(ledger.profiles().unwrap(), snapshot);
        assert_eq!(
            ledger.match_record(match_id).unwrap().unwrap().result,
            MatchResult::TeamAWin
        );
    }

    #[test]
    fn test_non_authority_rejected() {
        let (manager, _) = manager();
        let match_id = started(&manager);

        let err = manager
            .declare_result(match_id, Some("a2"), Team::A, None)
            .unwrap_err();
        assert!(matches!(err, LadderError::PermissionDenied { .. }));
        assert_eq!(
            manager.match_info(match_id).unwrap().unwrap().state,
            MatchState::AwaitingResult
        );
    }

    #[test]
    fn test_authority_seam_is_consulted() {
        let mut authority = MockResultAuthority::new();
        authority
            .expect_may_manage()
            .withf(|_, actor, action| actor == "ref" && *action == MatchAction::Declare)
            .times(1)
            .return_const(true);

        let ledger = Ledger::new(Arc::new(InMemoryLedgerStore::new()), StartingKit::default());
        let manager = MatchManager::new(
            ledger,
            RewardRules::default(),
            Arc::new(authority),
            Duration::minutes(2),
        );
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();
        manager.start_match(record.id, None).unwrap();

        manager
            .declare_result(record.id, Some("ref"), Team::A, None)
            .unwrap();
    }

    #[test]
    fn test_failed_settlement_stays_settling_until_retried() {
        let store = Arc::new(MockLedgerStore::new());
        let (manager, ledger) = manager_with(store.clone());
        let match_id = started(&manager);
        for id in ["a1", "a2", "b1", "b2"] {
            ledger.get_or_create(id).unwrap();
        }
        let before = ledger.profiles().unwrap();

        store.fail_next_commits(1);
        let err = manager
            .declare_result(match_id, Some("a1"), Team::A, None)
            .unwrap_err();
        assert!(matches!(err, LadderError::Persistence { .. }));
        assert_eq!(ledger.profiles().unwrap(), before);
        assert_eq!(
            manager.match_info(match_id).unwrap().unwrap().state,
            MatchState::Settling
        );
        assert_eq!(manager.stats().unwrap().settling_matches, 1);

        // Cannot be cancelled or re-declared while settling
        assert!(matches!(
            manager.cancel_match(match_id, Some("a1")),
            Err(LadderError::AlreadySettled { .. })
        ));

        let report = manager.retry_settlement(match_id, Some("mod")).unwrap();
        assert_eq!(report.record.result, MatchResult::TeamAWin);
        assert_eq!(ledger.profile("a2").unwrap().unwrap().points, 50);
    }

    #[test]
    fn test_cancel_keeps_consumed_items() {
        let (manager, ledger) = manager();
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();
        manager
            .activate_item(record.id, "a1", ItemKind::DoubleToken)
            .unwrap();
        let points_before = ledger.profile("a1").unwrap().unwrap().points;

        let cancelled = manager.cancel_match(record.id, Some("b1")).unwrap();
        assert_eq!(cancelled.result, MatchResult::Cancelled);

        let profile = ledger.profile("a1").unwrap().unwrap();
        assert_eq!(profile.inventory.double_tokens, 0);
        assert_eq!(profile.points, points_before);
        assert!(manager.active_match_of("a1").unwrap().is_none());
        assert!(matches!(
            manager.declare_result(record.id, Some("a1"), Team::A, None),
            Err(LadderError::AlreadySettled { .. })
        ));
    }

    #[test]
    fn test_item_window_expiry_starts_match() {
        let (manager, _) = manager();
        let record = manager
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        assert!(manager
            .expire_item_windows(current_timestamp())
            .unwrap()
            .is_empty());
        let started = manager
            .expire_item_windows(current_timestamp() + Duration::minutes(3))
            .unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(
            manager.match_info(record.id).unwrap().unwrap().state,
            MatchState::AwaitingResult
        );
    }

    #[test]
    fn test_restore_pending_matches() {
        let store: Arc<dyn crate::ledger::LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let (first, _) = manager_with(store.clone());
        let record = first
            .form_match("vc-1".to_string(), TeamSize::Duo, teams())
            .unwrap();

        let (second, _) = manager_with(store);
        assert_eq!(second.restore_pending().unwrap(), 1);
        assert_eq!(second.active_match_of("a1").unwrap(), Some(record.id));
        second
            .declare_result(record.id, Some("a1"), Team::A, None)
            .unwrap();
    }
}
