//! The request/response facade adapters call into
//!
//! [`LadderService`] turns front-end commands into calls on the queue
//! manager, the balancer, the match manager and the economy engine, then
//! publishes the resulting domain events. A failed publish is logged and
//! never undoes the core change it reports.

use crate::balance::{SnakeDraftBalancer, TeamBalancer};
use crate::config::{AppConfig, ChannelBindingStore, ChannelPurpose};
use crate::economy::{
    DailyClaim, DailyReward, EconomyEngine, GiftReceipt, RewardRules, TradeReceipt,
};
use crate::error::Result;
use crate::events::{EventPublisher, LadderEvent};
use crate::ledger::{Ledger, LedgerStore, MatchRecord, PlayerProfile};
use crate::matches::{
    CaptainAuthority, MatchManager, MatchSnapshot, MatchState, MatchStats, ResultAuthority,
    SettlementReport,
};
use crate::metrics::MetricsCollector;
use crate::queue::{JoinOutcome, LeaveOutcome, QueueManager, QueueSession, QueueStats};
use crate::types::{
    ContextId, ItemKind, MatchId, MatchResult, PlayerId, RankingKey, Team, TeamSize,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Matches shown by a history query when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Rows shown by a ranking query when no limit is given
pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// What a join did
#[derive(Debug, Clone)]
pub enum QueueUpdate {
    /// Still waiting for more players
    Waiting(QueueSession),
    /// The join filled the queue and a match was formed from it
    MatchFormed(MatchRecord),
}

/// One line of a player's match history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
    pub team_size: TeamSize,
    pub team: Team,
    pub result: MatchResult,
    /// `None` for a cancelled match
    pub won: Option<bool>,
    pub mvp: bool,
    pub item: Option<ItemKind>,
    pub point_delta: i64,
}

/// One row of a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position
    pub rank: usize,
    pub player_id: PlayerId,
    /// Value of the requested sort key
    pub value: i64,
    pub points: i64,
    pub tier: crate::ledger::Tier,
}

/// What one sweep did
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub expired_queues: Vec<QueueSession>,
    pub started_matches: Vec<MatchRecord>,
}

/// Combined statistics of the core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LadderStats {
    pub queues: QueueStats,
    pub matches: MatchStats,
    pub registered_players: usize,
}

/// Transport-agnostic entry point of the ranked core
pub struct LadderService {
    ledger: Ledger,
    queues: QueueManager,
    matches: MatchManager,
    balancer: Arc<dyn TeamBalancer>,
    economy: EconomyEngine,
    channels: ChannelBindingStore,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
    default_size: TeamSize,
}

impl LadderService {
    /// Build the core with captains and the configured moderators as the
    /// result authority
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn LedgerStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let authority = Arc::new(CaptainAuthority::new(config.matches.moderators.clone()));
        Self::with_authority(config, store, publisher, authority)
    }

    pub fn with_authority(
        config: &AppConfig,
        store: Arc<dyn LedgerStore>,
        publisher: Arc<dyn EventPublisher>,
        authority: Arc<dyn ResultAuthority>,
    ) -> Self {
        let ledger = Ledger::new(store, config.economy.starting_kit());
        let idle_timeout = match config.queue.idle_timeout_seconds {
            0 => None,
            secs => Some(chrono::Duration::seconds(secs as i64)),
        };

        Self {
            queues: QueueManager::new(idle_timeout),
            matches: MatchManager::new(
                ledger.clone(),
                RewardRules::from_settings(&config.economy),
                authority,
                config.item_window(),
            ),
            balancer: Arc::new(SnakeDraftBalancer::new()),
            economy: EconomyEngine::new(ledger.clone(), config.economy.clone()),
            channels: ChannelBindingStore::in_memory(),
            publisher,
            metrics: None,
            default_size: config.default_team_size(),
            ledger,
        }
    }

    pub fn with_channels(mut self, channels: ChannelBindingStore) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_balancer(mut self, balancer: Arc<dyn TeamBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    pub fn matches(&self) -> &MatchManager {
        &self.matches
    }

    pub fn economy(&self) -> &EconomyEngine {
        &self.economy
    }

    fn record_metrics(&self, f: impl FnOnce(&MetricsCollector)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    async fn emit(&self, event: LadderEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish {} event: {}", event_type, e);
        }
    }

    /// Re-register matches left pending by a previous run
    pub fn restore(&self) -> Result<usize> {
        let restored = self.matches.restore_pending()?;
        if restored > 0 {
            info!("Restored {} pending matches from the ledger", restored);
        }
        Ok(restored)
    }

    /// Add a player to the context's queue, forming a match when it fills.
    ///
    /// The match is registered before the queue releases its members and
    /// before any event goes out. When formation fails the queue waits again
    /// as it was before this join.
    pub async fn join_queue(
        &self,
        context_id: &str,
        player_id: &str,
        size: Option<TeamSize>,
    ) -> Result<QueueUpdate> {
        let size = size.unwrap_or(self.default_size);
        if let Some(match_id) = self.matches.active_match_of(player_id)? {
            return Err(crate::error::LadderError::AlreadyInMatch {
                player_id: player_id.to_string(),
                match_id,
            });
        }

        self.ledger.get_or_create(player_id)?;
        let outcome = self.queues.join(context_id, player_id, size)?;

        let session = match outcome {
            JoinOutcome::Waiting(session) => {
                self.record_metrics(|m| m.record_queue_join(size));
                self.emit_joined(context_id, player_id, &session).await;
                return Ok(QueueUpdate::Waiting(session));
            }
            JoinOutcome::Full(session) => session,
        };

        let record = match self.form_match(&session) {
            Ok(record) => record,
            Err(e) => {
                if let Err(restore) = self.queues.abort_handoff(&session.context_id) {
                    error!(
                        "Failed to restore queue '{}' after formation error: {}",
                        session.context_id, restore
                    );
                }
                return Err(e);
            }
        };
        self.queues.finish_handoff(&session.context_id)?;
        self.record_metrics(|m| {
            m.record_queue_join(size);
            m.record_session_formed(session.size);
        });

        self.emit_joined(context_id, player_id, &session).await;
        self.emit(LadderEvent::SessionFull {
            context_id: session.context_id.clone(),
            size: session.size,
            members: session.members.clone(),
        })
        .await;

        let item_deadline = self
            .matches
            .match_info(record.id)?
            .and_then(|snapshot| snapshot.item_deadline);
        self.emit(LadderEvent::MatchFormed {
            match_id: record.id,
            context_id: record.context_id.clone(),
            size: record.team_size,
            team_a: record.team_a.clone(),
            team_b: record.team_b.clone(),
            captain_a: record.captain_a.clone(),
            captain_b: record.captain_b.clone(),
            item_deadline,
        })
        .await;

        Ok(QueueUpdate::MatchFormed(record))
    }

    async fn emit_joined(&self, context_id: &str, player_id: &str, session: &QueueSession) {
        self.emit(LadderEvent::PlayerJoinedQueue {
            context_id: context_id.to_string(),
            player_id: player_id.to_string(),
            size: session.size,
            members: session.members.clone(),
        })
        .await;
    }

    fn form_match(&self, session: &QueueSession) -> Result<MatchRecord> {
        let roster = session
            .members
            .iter()
            .map(|id| self.ledger.get_or_create(id))
            .collect::<Result<Vec<_>>>()?;

        let teams = self.balancer.balance(&roster)?;
        debug!(
            "Balanced context '{}': {} vs {} points",
            session.context_id, teams.points_a, teams.points_b
        );

        self.matches
            .form_match(session.context_id.clone(), session.size, teams)
            .map_err(|e| {
                error!(
                    "Full queue in context '{}' could not become a match: {}",
                    session.context_id, e
                );
                e
            })
    }

    /// Remove a player from the context's queue. Leaving a queue one is not
    /// in is not an error.
    pub async fn leave_queue(&self, context_id: &str, player_id: &str) -> Result<LeaveOutcome> {
        let outcome = self.queues.leave(context_id, player_id)?;
        if let LeaveOutcome::Left { remaining } = outcome {
            self.record_metrics(|m| m.record_queue_leave());
            self.emit(LadderEvent::PlayerLeftQueue {
                context_id: context_id.to_string(),
                player_id: player_id.to_string(),
                remaining,
            })
            .await;
        }
        Ok(outcome)
    }

    /// Discard a waiting queue. Allowed for its creator and for moderators.
    pub fn close_queue(&self, context_id: &str, actor: &str) -> Result<QueueSession> {
        let is_moderator = self.matches.authority().is_moderator(actor);
        self.queues.close(context_id, actor, is_moderator)
    }

    pub async fn activate_item(
        &self,
        match_id: MatchId,
        player_id: &str,
        item: ItemKind,
    ) -> Result<(MatchRecord, PlayerProfile)> {
        let activated = self.matches.activate_item(match_id, player_id, item)?;
        self.record_metrics(|m| m.record_item_activated(item));
        self.emit(LadderEvent::ItemActivated {
            match_id,
            player_id: player_id.to_string(),
            item,
        })
        .await;
        Ok(activated)
    }

    /// Close the item window on the authority's signal
    pub async fn start_match(&self, match_id: MatchId, actor: &str) -> Result<MatchRecord> {
        let record = self.matches.start_match(match_id, Some(actor))?;
        self.emit(LadderEvent::MatchStarted {
            match_id,
            started_by: Some(actor.to_string()),
        })
        .await;
        Ok(record)
    }

    pub async fn declare_result(
        &self,
        match_id: MatchId,
        actor: &str,
        winner: Team,
        mvp: Option<PlayerId>,
    ) -> Result<SettlementReport> {
        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        let outcome = self.matches.declare_result(match_id, Some(actor), winner, mvp);
        self.after_settlement(match_id, outcome, timer).await
    }

    /// Re-run the ledger write of a match whose settlement failed
    pub async fn retry_settlement(
        &self,
        match_id: MatchId,
        actor: &str,
    ) -> Result<SettlementReport> {
        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        let outcome = self.matches.retry_settlement(match_id, Some(actor));
        self.after_settlement(match_id, outcome, timer).await
    }

    async fn after_settlement(
        &self,
        match_id: MatchId,
        outcome: Result<SettlementReport>,
        timer: Option<crate::metrics::collector::MetricsTimer>,
    ) -> Result<SettlementReport> {
        match outcome {
            Ok(report) => {
                let elapsed = timer.map(|t| t.stop());
                self.record_metrics(|m| m.record_match_finished(report.record.result, elapsed));
                self.emit(LadderEvent::MatchSettled {
                    match_id,
                    result: report.record.result,
                    mvp: report.record.mvp.clone(),
                    outcomes: report.outcomes.clone(),
                })
                .await;
                Ok(report)
            }
            Err(e) => {
                let stuck = matches!(
                    self.matches.match_info(match_id),
                    Ok(Some(MatchSnapshot {
                        state: MatchState::Settling,
                        ..
                    }))
                );
                if stuck {
                    self.record_metrics(|m| m.record_settlement_failure());
                    self.emit(LadderEvent::SettlementFailed {
                        match_id,
                        reason: e.to_string(),
                    })
                    .await;
                }
                Err(e)
            }
        }
    }

    pub async fn cancel_match(&self, match_id: MatchId, actor: &str) -> Result<MatchRecord> {
        let record = self.matches.cancel_match(match_id, Some(actor))?;
        self.record_metrics(|m| m.record_match_finished(MatchResult::Cancelled, None));
        self.emit(LadderEvent::MatchCancelled {
            match_id,
            cancelled_by: Some(actor.to_string()),
        })
        .await;
        Ok(record)
    }

    pub fn match_info(&self, match_id: MatchId) -> Result<Option<MatchSnapshot>> {
        self.matches.match_info(match_id)
    }

    /// Claim the daily reward now, drawing from the thread RNG
    pub fn claim_daily(&self, player_id: &str) -> Result<DailyClaim> {
        self.claim_daily_with(player_id, current_timestamp(), &mut rand::thread_rng())
    }

    pub fn claim_daily_with<R: Rng + ?Sized>(
        &self,
        player_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<DailyClaim> {
        let claim = self.economy.claim_daily(player_id, now, rng)?;
        let reward_type = match claim.reward {
            DailyReward::Coins(_) => "coins",
            DailyReward::Item(_) => "item",
        };
        self.record_metrics(|m| m.record_daily_claim(reward_type));
        Ok(claim)
    }

    pub fn buy_item(&self, player_id: &str, item: ItemKind, quantity: u32) -> Result<TradeReceipt> {
        let receipt = self.economy.buy(player_id, item, quantity)?;
        self.record_metrics(|m| m.record_transaction("buy"));
        Ok(receipt)
    }

    pub fn sell_item(&self, player_id: &str, item: ItemKind, quantity: u32) -> Result<TradeReceipt> {
        let receipt = self.economy.sell(player_id, item, quantity)?;
        self.record_metrics(|m| m.record_transaction("sell"));
        Ok(receipt)
    }

    pub fn gift_currency(&self, from: &str, to: &str, amount: i64) -> Result<GiftReceipt> {
        let receipt = self.economy.gift(from, to, amount)?;
        self.record_metrics(|m| m.record_transaction("gift"));
        Ok(receipt)
    }

    /// Profile of a player, created with defaults on first access
    pub fn get_profile(&self, player_id: &str) -> Result<PlayerProfile> {
        self.ledger.get_or_create(player_id)
    }

    /// Finished matches the player took part in, newest first
    pub fn get_history(&self, player_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let history = self
            .ledger
            .matches()?
            .into_iter()
            .rev()
            .filter(|record| record.is_settled())
            .filter_map(|record| {
                let team = record.team_of(player_id)?;
                Some(HistoryEntry {
                    match_id: record.id,
                    timestamp: record.settled_at.unwrap_or(record.timestamp),
                    team_size: record.team_size,
                    team,
                    result: record.result,
                    won: record.result.winner().map(|winner| winner == team),
                    mvp: record.mvp.as_deref() == Some(player_id),
                    item: record.items_activated.get(player_id).copied(),
                    point_delta: record.point_deltas.get(player_id).copied().unwrap_or(0),
                })
            })
            .take(limit)
            .collect();
        Ok(history)
    }

    /// Players sorted by `key`, highest first; ties go to the smaller id
    pub fn get_rankings(&self, key: RankingKey, limit: usize) -> Result<Vec<RankingEntry>> {
        let mut profiles = self.ledger.profiles()?;
        profiles.sort_by(|a, b| {
            ranking_value(b, key)
                .cmp(&ranking_value(a, key))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(profiles
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, profile)| RankingEntry {
                rank: index + 1,
                value: ranking_value(&profile, key),
                points: profile.points,
                tier: profile.tier,
                player_id: profile.id,
            })
            .collect())
    }

    pub fn channel_binding(&self, purpose: ChannelPurpose) -> Result<Option<String>> {
        self.channels.get(purpose)
    }

    /// Rebind or clear a purpose. Reserved for the configuration collaborator.
    pub fn set_channel_binding(
        &self,
        purpose: ChannelPurpose,
        destination: Option<String>,
    ) -> Result<()> {
        self.channels.set(purpose, destination)
    }

    /// Drop idle queues and start matches whose item window has passed
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired_queues = self.queues.sweep_idle(now)?;
        let started_matches = self.matches.expire_item_windows(now)?;

        for record in &started_matches {
            self.emit(LadderEvent::MatchStarted {
                match_id: record.id,
                started_by: None,
            })
            .await;
        }

        if !expired_queues.is_empty() || !started_matches.is_empty() {
            info!(
                "Sweep dropped {} idle queues and started {} matches",
                expired_queues.len(),
                started_matches.len()
            );
        }
        Ok(SweepReport {
            expired_queues,
            started_matches,
        })
    }

    pub fn stats(&self) -> Result<LadderStats> {
        let stats = LadderStats {
            queues: self.queues.stats()?,
            matches: self.matches.stats()?,
            registered_players: self.ledger.profiles()?.len(),
        };
        self.record_metrics(|m| m.update_from_stats(&stats.queues, &stats.matches));
        Ok(stats)
    }

    pub fn queue_of(&self, player_id: &str) -> Result<Option<ContextId>> {
        self.queues.queue_of(player_id)
    }
}

fn ranking_value(profile: &PlayerProfile, key: RankingKey) -> i64 {
    match key {
        RankingKey::Points => profile.points,
        RankingKey::Wins => i64::from(profile.wins),
        RankingKey::Losses => i64::from(profile.losses),
        RankingKey::MaxStreak => i64::from(profile.max_streak),
        RankingKey::Currency => i64::try_from(profile.currency).unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LadderError};
    use crate::events::MockEventPublisher;
    use crate::ledger::{InMemoryLedgerStore, MockLedgerStore};

    fn service_with(
        store: Arc<dyn LedgerStore>,
        config: AppConfig,
    ) -> (LadderService, Arc<MockEventPublisher>) {
        let publisher = Arc::new(MockEventPublisher::new());
        let service = LadderService::new(&config, store, publisher.clone());
        (service, publisher)
    }

    fn service() -> (LadderService, Arc<MockEventPublisher>) {
        service_with(Arc::new(InMemoryLedgerStore::new()), AppConfig::default())
    }

    async fn fill_duo(service: &LadderService, context: &str, prefix: &str) -> MatchRecord {
        let mut formed = None;
        for i in 0..4 {
            let player = format!("{}{}", prefix, i);
            if let QueueUpdate::MatchFormed(record) = service
                .join_queue(context, &player, Some(TeamSize::Duo))
                .await
                .unwrap()
            {
                formed = Some(record);
            }
        }
        formed.expect("fourth join forms the match")
    }

    #[tokio::test]
    async fn test_full_queue_forms_match_once() {
        let (service, publisher) = service();
        let record = fill_duo(&service, "vc-1", "p").await;

        assert_eq!(record.team_a.len(), 2);
        assert_eq!(record.team_b.len(), 2);
        assert!(service.queues().snapshot("vc-1").unwrap().is_none());
        assert_eq!(publisher.count_events_of_type("PlayerJoinedQueue"), 4);
        assert_eq!(publisher.count_events_of_type("SessionFull"), 1);
        assert_eq!(publisher.count_events_of_type("MatchFormed"), 1);

        let snapshot = service.match_info(record.id).unwrap().unwrap();
        assert_eq!(snapshot.state, MatchState::AwaitingItems);
    }

    #[tokio::test]
    async fn test_player_in_match_cannot_requeue() {
        let (service, _) = service();
        let record = fill_duo(&service, "vc-1", "p").await;

        let err = service
            .join_queue("vc-2", "p0", Some(TeamSize::Duo))
            .await
            .unwrap_err();
        assert!(matches!(err, LadderError::AlreadyInMatch { match_id, .. } if match_id == record.id));
    }

    #[tokio::test]
    async fn test_settlement_updates_profiles_and_history() {
        let (service, publisher) = service();
        let record = fill_duo(&service, "vc-1", "p").await;
        let captain = record.captain_a.clone();
        let mvp = record.team_a[1].clone();

        service
            .activate_item(record.id, &mvp, ItemKind::DoubleToken)
            .await
            .unwrap();
        service.start_match(record.id, &captain).await.unwrap();
        let report = service
            .declare_result(record.id, &captain, Team::A, Some(mvp.clone()))
            .await
            .unwrap();
        assert_eq!(report.record.result, MatchResult::TeamAWin);

        let profile = service.get_profile(&mvp).unwrap();
        assert_eq!(profile.points, 150);
        assert_eq!(profile.inventory.double_tokens, 0);

        let history = service.get_history(&mvp, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].point_delta, 150);
        assert_eq!(history[0].won, Some(true));
        assert!(history[0].mvp);
        assert_eq!(history[0].item, Some(ItemKind::DoubleToken));

        assert_eq!(publisher.count_events_of_type("MatchSettled"), 1);
        assert!(service.matches().active_match_of(&mvp).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_declaration_is_already_settled() {
        let (service, _) = service();
        let record = fill_duo(&service, "vc-1", "p").await;
        let captain = record.captain_b.clone();
        service.start_match(record.id, &captain).await.unwrap();
        service
            .declare_result(record.id, &captain, Team::B, None)
            .await
            .unwrap();
        let before = service.get_profile(&captain).unwrap();

        let err = service
            .declare_result(record.id, &captain, Team::A, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LadderError::AlreadySettled { .. }));
        assert_eq!(service.get_profile(&captain).unwrap(), before);
    }

    #[tokio::test]
    async fn test_non_captain_cannot_declare() {
        let (service, _) = service();
        let record = fill_duo(&service, "vc-1", "p").await;
        service
            .start_match(record.id, &record.captain_a)
            .await
            .unwrap();

        let err = service
            .declare_result(record.id, &record.team_a[1], Team::A, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_failed_settlement_is_reported_and_retried() {
        let store = Arc::new(MockLedgerStore::new());
        let (service, publisher) = service_with(store.clone(), AppConfig::default());
        let record = fill_duo(&service, "vc-1", "p").await;
        let captain = record.captain_a.clone();
        service.start_match(record.id, &captain).await.unwrap();

        store.fail_next_commits(1);
        let err = service
            .declare_result(record.id, &captain, Team::A, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert_eq!(publisher.count_events_of_type("SettlementFailed"), 1);
        assert_eq!(service.get_profile(&captain).unwrap().points, 0);

        service
            .retry_settlement(record.id, &captain)
            .await
            .unwrap();
        assert_eq!(service.get_profile(&captain).unwrap().points, 50);
        assert_eq!(publisher.count_events_of_type("MatchSettled"), 1);
    }

    #[tokio::test]
    async fn test_cancel_keeps_items_consumed() {
        let (service, publisher) = service();
        let record = fill_duo(&service, "vc-1", "p").await;
        let player = record.team_b[1].clone();
        service
            .activate_item(record.id, &player, ItemKind::ShieldToken)
            .await
            .unwrap();

        let cancelled = service
            .cancel_match(record.id, &record.captain_b)
            .await
            .unwrap();
        assert_eq!(cancelled.result, MatchResult::Cancelled);

        let profile = service.get_profile(&player).unwrap();
        assert_eq!(profile.inventory.shield_tokens, 0);
        assert_eq!(profile.points, 0);
        assert_eq!(publisher.count_events_of_type("MatchCancelled"), 1);

        let history = service.get_history(&player, 5).unwrap();
        assert_eq!(history[0].won, None);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_undo_join() {
        let (service, publisher) = service();
        publisher.fail_publishes(true);
        let update = service
            .join_queue("vc-1", "p1", Some(TeamSize::Trio))
            .await
            .unwrap();
        assert!(matches!(update, QueueUpdate::Waiting(ref s) if s.members == vec!["p1".to_string()]));
        assert_eq!(service.queue_of("p1").unwrap(), Some("vc-1".to_string()));
    }

    #[tokio::test]
    async fn test_leave_queue_events() {
        let (service, publisher) = service();
        service.join_queue("vc-1", "p1", None).await.unwrap();

        assert_eq!(
            service.leave_queue("vc-1", "p1").await.unwrap(),
            LeaveOutcome::Left { remaining: 0 }
        );
        assert_eq!(
            service.leave_queue("vc-1", "p1").await.unwrap(),
            LeaveOutcome::NotQueued
        );
        assert_eq!(publisher.count_events_of_type("PlayerLeftQueue"), 1);
    }

    #[tokio::test]
    async fn test_sweep_starts_expired_matches() {
        let (service, publisher) = service();
        let record = fill_duo(&service, "vc-1", "p").await;

        let report = service
            .sweep(current_timestamp() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(report.started_matches.len(), 1);
        assert_eq!(
            service.match_info(record.id).unwrap().unwrap().state,
            MatchState::AwaitingResult
        );
        assert_eq!(publisher.count_events_of_type("MatchStarted"), 1);
    }

    #[test]
    fn test_rankings_order_and_ties() {
        let (service, _) = service();
        for (id, points) in [("carol", 80), ("alice", 120), ("bob", 80)] {
            service
                .ledger()
                .update_profile(id, |p| {
                    p.points = points;
                    Ok(())
                })
                .unwrap();
        }

        let rankings = service.get_rankings(RankingKey::Points, 10).unwrap();
        let order: Vec<_> = rankings.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[2].rank, 3);

        assert_eq!(service.get_rankings(RankingKey::Points, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_channel_bindings_roundtrip() {
        let (service, _) = service();
        assert_eq!(service.channel_binding(ChannelPurpose::Logs).unwrap(), None);
        service
            .set_channel_binding(ChannelPurpose::Logs, Some("chan-9".to_string()))
            .unwrap();
        assert_eq!(
            service.channel_binding(ChannelPurpose::Logs).unwrap(),
            Some("chan-9".to_string())
        );
    }

    #[test]
    fn test_close_queue_by_moderator() {
        let mut config = AppConfig::default();
        config.matches.moderators = vec!["mod".to_string()];
        let (service, _) = service_with(Arc::new(InMemoryLedgerStore::new()), config);
        service.queues().join("vc-1", "p1", TeamSize::Duo).unwrap();

        let err = service.close_queue("vc-1", "stranger").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        let closed = service.close_queue("vc-1", "mod").unwrap();
        assert_eq!(closed.members, vec!["p1".to_string()]);
    }
}
