//! Domain events emitted by the core

use crate::economy::PlayerOutcome;
use crate::error::{LadderError, Result};
use crate::types::{ContextId, ItemKind, MatchId, MatchResult, PlayerId, TeamSize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topics adapters can route on
pub const QUEUE_TOPIC: &str = "ladder.queue";
pub const MATCH_TOPIC: &str = "ladder.match";
pub const SETTLEMENT_TOPIC: &str = "ladder.settlement";

/// Something the adapter layer may want to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LadderEvent {
    PlayerJoinedQueue {
        context_id: ContextId,
        player_id: PlayerId,
        size: TeamSize,
        members: Vec<PlayerId>,
    },
    PlayerLeftQueue {
        context_id: ContextId,
        player_id: PlayerId,
        remaining: usize,
    },
    SessionFull {
        context_id: ContextId,
        size: TeamSize,
        members: Vec<PlayerId>,
    },
    MatchFormed {
        match_id: MatchId,
        context_id: ContextId,
        size: TeamSize,
        team_a: Vec<PlayerId>,
        team_b: Vec<PlayerId>,
        captain_a: PlayerId,
        captain_b: PlayerId,
        item_deadline: Option<DateTime<Utc>>,
    },
    ItemActivated {
        match_id: MatchId,
        player_id: PlayerId,
        item: ItemKind,
    },
    MatchStarted {
        match_id: MatchId,
        started_by: Option<PlayerId>,
    },
    MatchSettled {
        match_id: MatchId,
        result: MatchResult,
        mvp: Option<PlayerId>,
        outcomes: Vec<PlayerOutcome>,
    },
    MatchCancelled {
        match_id: MatchId,
        cancelled_by: Option<PlayerId>,
    },
    SettlementFailed {
        match_id: MatchId,
        reason: String,
    },
}

impl LadderEvent {
    /// Stable name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            LadderEvent::PlayerJoinedQueue { .. } => "PlayerJoinedQueue",
            LadderEvent::PlayerLeftQueue { .. } => "PlayerLeftQueue",
            LadderEvent::SessionFull { .. } => "SessionFull",
            LadderEvent::MatchFormed { .. } => "MatchFormed",
            LadderEvent::ItemActivated { .. } => "ItemActivated",
            LadderEvent::MatchStarted { .. } => "MatchStarted",
            LadderEvent::MatchSettled { .. } => "MatchSettled",
            LadderEvent::MatchCancelled { .. } => "MatchCancelled",
            LadderEvent::SettlementFailed { .. } => "SettlementFailed",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            LadderEvent::PlayerJoinedQueue { .. }
            | LadderEvent::PlayerLeftQueue { .. }
            | LadderEvent::SessionFull { .. } => QUEUE_TOPIC,
            LadderEvent::MatchFormed { .. }
            | LadderEvent::ItemActivated { .. }
            | LadderEvent::MatchStarted { .. }
            | LadderEvent::MatchCancelled { .. } => MATCH_TOPIC,
            LadderEvent::MatchSettled { .. } | LadderEvent::SettlementFailed { .. } => {
                SETTLEMENT_TOPIC
            }
        }
    }
}

/// Event envelope with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: LadderEvent,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
}

impl EventEnvelope {
    pub fn new(event: LadderEvent) -> Self {
        let topic = event.topic().to_string();
        Self {
            event,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            topic,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LadderError::Internal {
            message: format!("Failed to serialize event: {}", e),
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            LadderError::validation(format!("Failed to deserialize event: {}", e))
        })
    }
}
