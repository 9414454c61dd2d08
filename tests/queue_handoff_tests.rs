//! Queue to match handoff tests
//!
//! A full queue only lets go of its members once their match is registered,
//! and a formation that fails leaves the queue waiting as it was.

mod fixtures;

use async_trait::async_trait;
use ranked_room::error::{ErrorKind, LadderError};
use ranked_room::events::{EventPublisher, LadderEvent};
use ranked_room::ledger::InMemoryLedgerStore;
use ranked_room::service::{LadderService, QueueUpdate};
use ranked_room::types::TeamSize;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use fixtures::{create_faulty_system, test_config};

/// Holds every `SessionFull` publish until released
#[derive(Default)]
struct HeldSessionFull {
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl EventPublisher for HeldSessionFull {
    async fn publish(&self, event: LadderEvent) -> ranked_room::Result<()> {
        if matches!(event, LadderEvent::SessionFull { .. }) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }
}

async fn join(service: &LadderService, context_id: &str, player_id: &str) -> QueueUpdate {
    assert_ok!(
        service
            .join_queue(context_id, player_id, Some(TeamSize::Duo))
            .await
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_members_stay_claimed_while_events_are_in_flight() {
    let publisher = Arc::new(HeldSessionFull::default());
    let service = Arc::new(LadderService::new(
        &test_config(),
        Arc::new(InMemoryLedgerStore::new()),
        publisher.clone(),
    ));

    for player in ["x1", "x2", "x3"] {
        join(&service, "voice-2", player).await;
    }
    for player in ["a", "b", "c"] {
        join(&service, "voice-1", player).await;
    }

    let filling = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .join_queue("voice-1", "d", Some(TeamSize::Duo))
                .await
        })
    };
    publisher.reached.notified().await;

    // The match exists before anyone hears the queue filled
    let err = assert_err!(
        service
            .join_queue("voice-2", "a", Some(TeamSize::Duo))
            .await
    );
    assert!(matches!(err, LadderError::AlreadyInMatch { .. }));
    assert!(service.queue_of("a").unwrap().is_none());

    let waiting = service.queues().snapshot("voice-2").unwrap().unwrap();
    assert_eq!(waiting.members, vec!["x1", "x2", "x3"]);
    for player in ["x1", "x2", "x3"] {
        assert_eq!(service.queue_of(player).unwrap().as_deref(), Some("voice-2"));
    }

    publisher.release.notify_one();
    let formed = assert_ok!(filling.await.expect("task panicked"));
    assert!(matches!(formed, QueueUpdate::MatchFormed(_)));

    publisher.release.notify_one();
    let QueueUpdate::MatchFormed(record) = join(&service, "voice-2", "x4").await else {
        panic!("fourth join should form a match");
    };
    assert_eq!(record.participants().count(), 4);
    assert!(!record.participants().any(|p| p == "a"));
    assert_eq!(service.stats().unwrap().matches.active_matches, 2);
}

#[tokio::test]
async fn test_failed_formation_keeps_queue_waiting() {
    let (service, store, publisher) = create_faulty_system();
    for player in ["p0", "p1", "p2"] {
        join(&service, "voice-1", player).await;
    }
    assert_ok!(service.ledger().get_or_create("p3"));

    store.fail_next_commits(1);
    let err = assert_err!(
        service
            .join_queue("voice-1", "p3", Some(TeamSize::Duo))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);

    let session = service.queues().snapshot("voice-1").unwrap().unwrap();
    assert_eq!(session.members, vec!["p0", "p1", "p2"]);
    for player in ["p0", "p1", "p2"] {
        assert_eq!(service.queue_of(player).unwrap().as_deref(), Some("voice-1"));
        assert!(service.matches().active_match_of(player).unwrap().is_none());
    }
    assert!(service.queue_of("p3").unwrap().is_none());
    assert!(service.ledger().matches().unwrap().is_empty());

    assert_eq!(publisher.count_events_of_type("PlayerJoinedQueue"), 3);
    assert_eq!(publisher.count_events_of_type("SessionFull"), 0);
    assert_eq!(publisher.count_events_of_type("MatchFormed"), 0);

    let stats = service.stats().unwrap();
    assert_eq!(stats.queues.joins, 3);
    assert_eq!(stats.queues.sessions_filled, 0);
    assert_eq!(stats.queues.players_waiting, 3);

    let QueueUpdate::MatchFormed(record) = join(&service, "voice-1", "p3").await else {
        panic!("retried join should form a match");
    };
    let mut players: Vec<_> = record.participants().cloned().collect();
    players.sort();
    assert_eq!(players, vec!["p0", "p1", "p2", "p3"]);
    assert!(service.queue_of("p0").unwrap().is_none());
    assert_eq!(service.stats().unwrap().queues.sessions_filled, 1);
    assert_eq!(
        publisher.get_event_types()[3..],
        ["PlayerJoinedQueue", "SessionFull", "MatchFormed"]
    );
}
