//! A waiting room for one context

use crate::error::{LadderError, Result};
use crate::types::{ContextId, PlayerId, TeamSize};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Players waiting in one context for a match of a fixed size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSession {
    pub context_id: ContextId,
    pub size: TeamSize,
    /// Join order, no duplicates, never longer than `size.players_needed()`
    pub members: Vec<PlayerId>,
    /// First joiner; may close the queue
    pub created_by: PlayerId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl QueueSession {
    pub fn new(context_id: ContextId, size: TeamSize, creator: PlayerId) -> Self {
        let now = current_timestamp();
        Self {
            context_id,
            size,
            members: vec![creator.clone()],
            created_by: creator,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.members.iter().any(|m| m == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.size.players_needed()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Open seats left
    pub fn remaining(&self) -> usize {
        self.size.players_needed().saturating_sub(self.members.len())
    }

    /// Append a player; returns true when the session became full
    pub fn add(&mut self, player_id: PlayerId) -> Result<bool> {
        if self.contains(&player_id) {
            return Err(LadderError::AlreadyQueued {
                player_id,
                context_id: self.context_id.clone(),
            });
        }
        if self.is_full() {
            return Err(LadderError::Internal {
                message: format!("queue {} is already full", self.context_id),
            });
        }

        self.members.push(player_id);
        self.last_activity = current_timestamp();
        Ok(self.is_full())
    }

    /// Remove a player; returns whether they were a member
    pub fn remove(&mut self, player_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != player_id);
        let removed = self.members.len() != before;
        if removed {
            self.last_activity = current_timestamp();
        }
        removed
    }
}
