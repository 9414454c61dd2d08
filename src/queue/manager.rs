//! Queue manager: every waiting room in the community
//!
//! All sessions and the player → context membership index live behind one
//! lock, so the "already queued anywhere" check, the insert and the removal
//! of a session that just became full happen as a single step. A joiner that
//! fills a session receives it back as [`JoinOutcome::Full`]; nobody else can
//! observe or extend it afterwards.
//!
//! A full session stays reserved until the caller reports the handoff with
//! [`QueueManager::finish_handoff`] or [`QueueManager::abort_handoff`]. Its
//! members keep their membership entries meanwhile, so none of them can join
//! another queue before they are registered in a match.

use crate::error::{LadderError, Result};
use crate::queue::session::QueueSession;
use crate::types::{ContextId, PlayerId, TeamSize};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The player is waiting; snapshot of the session after the join
    Waiting(QueueSession),
    /// The join filled the session, which has left the waiting pool and is
    /// reserved until the handoff is finished or aborted
    Full(QueueSession),
}

impl JoinOutcome {
    pub fn session(&self) -> &QueueSession {
        match self {
            JoinOutcome::Waiting(session) | JoinOutcome::Full(session) => session,
        }
    }
}

/// Result of a leave request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player was not queued in that context
    NotQueued,
    /// The player left; `remaining` members are still waiting
    Left { remaining: usize },
}

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub joins: u64,
    pub leaves: u64,
    pub sessions_created: u64,
    pub sessions_filled: u64,
    pub sessions_closed: u64,
    pub sessions_expired: u64,
    /// Current number of waiting sessions
    pub active_sessions: usize,
    /// Current number of waiting players
    pub players_waiting: usize,
}

#[derive(Debug, Default)]
struct QueuePool {
    sessions: HashMap<ContextId, QueueSession>,
    /// Full sessions whose match is being formed
    forming: HashMap<ContextId, QueueSession>,
    /// Waiting and forming members
    membership: HashMap<PlayerId, ContextId>,
    stats: QueueStats,
}

impl QueuePool {
    fn detach(&mut self, context_id: &str) -> Option<QueueSession> {
        let session = self.sessions.remove(context_id)?;
        self.release(&session);
        Some(session)
    }

    fn release(&mut self, session: &QueueSession) {
        for member in &session.members {
            if self.membership.get(member) == Some(&session.context_id) {
                self.membership.remove(member);
            }
        }
    }

    fn players_waiting(&self) -> usize {
        self.sessions.values().map(|s| s.members.len()).sum()
    }
}

/// Owner of all waiting sessions
#[derive(Debug)]
pub struct QueueManager {
    pool: RwLock<QueuePool>,
    /// Sessions idle for longer than this are discarded; `None` keeps them forever
    idle_timeout: Option<Duration>,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl QueueManager {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            pool: RwLock::new(QueuePool::default()),
            idle_timeout,
        }
    }

    fn write_pool(&self) -> Result<std::sync::RwLockWriteGuard<'_, QueuePool>> {
        self.pool
            .write()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))
    }

    /// Add `player_id` to the session of `context_id`, creating it if absent
    pub fn join(&self, context_id: &str, player_id: &str, size: TeamSize) -> Result<JoinOutcome> {
        let mut pool = self.write_pool()?;

        if let Some(current) = pool.membership.get(player_id) {
            return Err(LadderError::AlreadyQueued {
                player_id: player_id.to_string(),
                context_id: current.clone(),
            });
        }
        if pool.forming.contains_key(context_id) {
            return Err(LadderError::QueueForming {
                context_id: context_id.to_string(),
            });
        }

        let full = match pool.sessions.get_mut(context_id) {
            Some(session) => {
                if session.size != size {
                    return Err(LadderError::SizeMismatch {
                        context_id: context_id.to_string(),
                        existing: session.size,
                        requested: size,
                    });
                }
                session.add(player_id.to_string())?
            }
            None => {
                let session =
                    QueueSession::new(context_id.to_string(), size, player_id.to_string());
                let full = session.is_full();
                pool.sessions.insert(context_id.to_string(), session);
                pool.stats.sessions_created += 1;
                info!("Opened {} queue in context '{}'", size, context_id);
                full
            }
        };

        pool.membership
            .insert(player_id.to_string(), context_id.to_string());
        pool.stats.joins += 1;

        if full {
            let session = pool
                .sessions
                .remove(context_id)
                .ok_or_else(|| LadderError::Internal {
                    message: format!("queue {} vanished while filling", context_id),
                })?;
            pool.forming.insert(context_id.to_string(), session.clone());
            info!(
                "Queue in context '{}' is full with {} players",
                context_id,
                session.members.len()
            );
            return Ok(JoinOutcome::Full(session));
        }

        let snapshot = pool
            .sessions
            .get(context_id)
            .cloned()
            .ok_or_else(|| LadderError::Internal {
                message: format!("queue {} vanished after join", context_id),
            })?;
        debug!(
            "Player '{}' joined queue '{}' ({} open seats)",
            player_id,
            context_id,
            snapshot.remaining()
        );
        Ok(JoinOutcome::Waiting(snapshot))
    }

    /// Release a reserved session once its match is registered
    pub fn finish_handoff(&self, context_id: &str) -> Result<QueueSession> {
        let mut pool = self.write_pool()?;
        let session = pool
            .forming
            .remove(context_id)
            .ok_or_else(|| LadderError::Internal {
                message: format!("no queue is forming in context {}", context_id),
            })?;
        pool.release(&session);
        pool.stats.sessions_filled += 1;
        debug!("Queue '{}' handed off to its match", context_id);
        Ok(session)
    }

    /// Undo the join that filled a reserved session: the session waits again
    /// with every earlier member in order, and the filling joiner is dropped.
    pub fn abort_handoff(&self, context_id: &str) -> Result<QueueSession> {
        let mut pool = self.write_pool()?;
        let mut session = pool
            .forming
            .remove(context_id)
            .ok_or_else(|| LadderError::Internal {
                message: format!("no queue is forming in context {}", context_id),
            })?;

        if let Some(joiner) = session.members.pop() {
            if pool.membership.get(&joiner).map(String::as_str) == Some(context_id) {
                pool.membership.remove(&joiner);
            }
            pool.stats.joins = pool.stats.joins.saturating_sub(1);
        }

        if !session.members.is_empty() {
            pool.sessions.insert(context_id.to_string(), session.clone());
        }
        warn!(
            "Queue '{}' could not become a match, {} players waiting again",
            context_id,
            session.members.len()
        );
        Ok(session)
    }

    /// Remove `player_id` from the session of `context_id`. Not being queued
    /// there is not an error, and a session being turned into a match can no
    /// longer be left.
    pub fn leave(&self, context_id: &str, player_id: &str) -> Result<LeaveOutcome> {
        let mut pool = self.write_pool()?;

        if pool.membership.get(player_id).map(String::as_str) != Some(context_id)
            || pool.forming.contains_key(context_id)
        {
            return Ok(LeaveOutcome::NotQueued);
        }

        let remaining = match pool.sessions.get_mut(context_id) {
            Some(session) => {
                session.remove(player_id);
                session.members.len()
            }
            None => 0,
        };
        pool.membership.remove(player_id);
        pool.stats.leaves += 1;

        if remaining == 0 {
            pool.sessions.remove(context_id);
            debug!("Queue '{}' emptied and removed", context_id);
        }

        debug!("Player '{}' left queue '{}'", player_id, context_id);
        Ok(LeaveOutcome::Left { remaining })
    }

    /// Discard the waiting session of `context_id`. Only its creator or a
    /// moderator may do this.
    pub fn close(&self, context_id: &str, actor: &str, is_moderator: bool) -> Result<QueueSession> {
        let mut pool = self
            .pool
            .write()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))?;

        let session = pool
            .sessions
            .get(context_id)
            .ok_or_else(|| LadderError::NotFound {
                what: format!("queue in context {}", context_id),
            })?;
        if !is_moderator && session.created_by != actor {
            return Err(LadderError::PermissionDenied {
                player_id: actor.to_string(),
                action: format!("close the queue in context {}", context_id),
            });
        }

        let session = pool.detach(context_id).ok_or_else(|| LadderError::Internal {
            message: format!("queue {} vanished while closing", context_id),
        })?;
        pool.stats.sessions_closed += 1;
        info!(
            "Queue '{}' closed by '{}' with {} players waiting",
            context_id,
            actor,
            session.members.len()
        );
        Ok(session)
    }

    /// Context the player is currently queued in
    pub fn queue_of(&self, player_id: &str) -> Result<Option<ContextId>> {
        let pool = self
            .pool
            .read()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))?;
        Ok(pool.membership.get(player_id).cloned())
    }

    pub fn snapshot(&self, context_id: &str) -> Result<Option<QueueSession>> {
        let pool = self
            .pool
            .read()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))?;
        Ok(pool.sessions.get(context_id).cloned())
    }

    /// Drop sessions idle since before `now - idle_timeout`
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Result<Vec<QueueSession>> {
        let Some(timeout) = self.idle_timeout else {
            return Ok(Vec::new());
        };

        let mut pool = self
            .pool
            .write()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))?;

        let stale: Vec<ContextId> = pool
            .sessions
            .values()
            .filter(|s| now - s.last_activity > timeout)
            .map(|s| s.context_id.clone())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for context_id in stale {
            if let Some(session) = pool.detach(&context_id) {
                info!(
                    "Queue '{}' expired after inactivity ({} players released)",
                    context_id,
                    session.members.len()
                );
                expired.push(session);
            }
        }
        pool.stats.sessions_expired += expired.len() as u64;
        Ok(expired)
    }

    pub fn stats(&self) -> Result<QueueStats> {
        let pool = self
            .pool
            .read()
            .map_err(|_| LadderError::lock_poisoned("queue pool"))?;
        let mut stats = pool.stats.clone();
        stats.active_sessions = pool.sessions.len();
        stats.players_waiting = pool.players_waiting();
        Ok(stats)
    }
}
