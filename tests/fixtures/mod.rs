//! Test fixtures shared by the integration suites
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use ranked_room::config::AppConfig;
use ranked_room::events::MockEventPublisher;
use ranked_room::ledger::{InMemoryLedgerStore, LedgerStore, MockLedgerStore};
use ranked_room::service::{LadderService, QueueUpdate};
use ranked_room::types::TeamSize;
use ranked_room::MatchRecord;
use std::sync::Arc;

/// Moderator id configured in every test system
pub const MODERATOR: &str = "moderator";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.matches.moderators = vec![MODERATOR.to_string()];
    config
}

/// Core over an in-memory ledger, recording every published event
pub fn create_test_system() -> (LadderService, Arc<MockEventPublisher>) {
    create_system_with(Arc::new(InMemoryLedgerStore::new()), test_config())
}

/// Core over a ledger that can be told to fail its next writes
pub fn create_faulty_system() -> (LadderService, Arc<MockLedgerStore>, Arc<MockEventPublisher>) {
    let store = Arc::new(MockLedgerStore::new());
    let (service, publisher) = create_system_with(store.clone(), test_config());
    (service, store, publisher)
}

pub fn create_system_with(
    store: Arc<dyn LedgerStore>,
    config: AppConfig,
) -> (LadderService, Arc<MockEventPublisher>) {
    let publisher = Arc::new(MockEventPublisher::new());
    let service = LadderService::new(&config, store, publisher.clone());
    (service, publisher)
}

/// Join `players` in order and return the match the last join formed
pub async fn fill_queue(
    service: &LadderService,
    context_id: &str,
    players: &[&str],
    size: TeamSize,
) -> MatchRecord {
    assert_eq!(players.len(), size.players_needed(), "roster must fill the queue");

    let mut formed = None;
    for player in players {
        match service
            .join_queue(context_id, player, Some(size))
            .await
            .expect("join should succeed")
        {
            QueueUpdate::MatchFormed(record) => formed = Some(record),
            QueueUpdate::Waiting(_) => {}
        }
    }
    formed.expect("the last join should form a match")
}

/// Duo roster named `{prefix}1..{prefix}4`
pub fn duo_roster(prefix: &str) -> Vec<String> {
    (1..=4).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Give a player an exact point total
pub fn set_points(service: &LadderService, player_id: &str, points: i64) {
    service
        .ledger()
        .update_profile(player_id, |profile| {
            profile.points = points;
            profile.refresh_tier();
            Ok(())
        })
        .expect("profile update should succeed");
}

/// Give a player an exact coin balance
pub fn set_currency(service: &LadderService, player_id: &str, currency: u64) {
    service
        .ledger()
        .update_profile(player_id, |profile| {
            profile.currency = currency;
            Ok(())
        })
        .expect("profile update should succeed");
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
