//! Error types for the ranked matchmaking core
//!
//! Every failure the core can report is a [`LadderError`]. Each variant belongs
//! to one [`ErrorKind`] so front-end adapters can pick a message per category
//! without matching on every variant.

use crate::types::{ItemKind, MatchId, PlayerId, TeamSize};

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LadderError>;

/// Coarse error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    StateConflict,
    InsufficientResource,
    CooldownActive,
    PermissionDenied,
    PersistenceFailure,
    Internal,
}

/// Custom error types for specific ladder scenarios
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Player {player_id} is already queued in context {context_id}")]
    AlreadyQueued {
        player_id: PlayerId,
        context_id: String,
    },

    #[error("Queue in context {context_id} is {existing}, requested {requested}")]
    SizeMismatch {
        context_id: String,
        existing: TeamSize,
        requested: TeamSize,
    },

    #[error("Queue in context {context_id} is being turned into a match")]
    QueueForming { context_id: String },

    #[error("Player {player_id} is still in unsettled match {match_id}")]
    AlreadyInMatch {
        player_id: PlayerId,
        match_id: MatchId,
    },

    #[error("Match {match_id} already has a result")]
    AlreadySettled { match_id: MatchId },

    #[error("Match {match_id} cannot {action} while {state}")]
    InvalidTransition {
        match_id: MatchId,
        action: String,
        state: String,
    },

    #[error("Profile {player_id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        player_id: PlayerId,
        expected: u64,
        found: u64,
    },

    #[error("Player {player_id} needs {required} coins but has {available}")]
    InsufficientFunds {
        player_id: PlayerId,
        required: u64,
        available: u64,
    },

    #[error("Player {player_id} needs {required}x {item} but has {available}")]
    InsufficientInventory {
        player_id: PlayerId,
        item: ItemKind,
        required: u32,
        available: u32,
    },

    #[error("Player {player_id} already activated {item} in match {match_id}")]
    ItemAlreadyActivated {
        player_id: PlayerId,
        match_id: MatchId,
        item: ItemKind,
    },

    #[error("Daily reward on cooldown for {remaining_hours}h more")]
    CooldownActive { remaining_hours: i64 },

    #[error("Player {player_id} may not {action}")]
    PermissionDenied { player_id: PlayerId, action: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Ledger write failed: {message}")]
    Persistence { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LadderError {
    /// Category this error is reported under
    pub fn kind(&self) -> ErrorKind {
        match self {
            LadderError::Validation { .. } | LadderError::NotFound { .. } => {
                ErrorKind::ValidationError
            }
            LadderError::AlreadyQueued { .. }
            | LadderError::SizeMismatch { .. }
            | LadderError::QueueForming { .. }
            | LadderError::AlreadyInMatch { .. }
            | LadderError::AlreadySettled { .. }
            | LadderError::InvalidTransition { .. }
            | LadderError::VersionConflict { .. }
            | LadderError::ItemAlreadyActivated { .. } => ErrorKind::StateConflict,
            LadderError::InsufficientFunds { .. } | LadderError::InsufficientInventory { .. } => {
                ErrorKind::InsufficientResource
            }
            LadderError::CooldownActive { .. } => ErrorKind::CooldownActive,
            LadderError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            LadderError::Persistence { .. } => ErrorKind::PersistenceFailure,
            LadderError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        LadderError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        LadderError::Internal {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

impl From<std::io::Error> for LadderError {
    fn from(err: std::io::Error) -> Self {
        LadderError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LadderError {
    fn from(err: serde_json::Error) -> Self {
        LadderError::Persistence {
            message: format!("serialization failed: {}", err),
        }
    }
}
