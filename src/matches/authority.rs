//! Who may drive a match forward

use crate::ledger::MatchRecord;
use std::collections::HashSet;

/// Restricted match transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchAction {
    Start,
    Declare,
    Cancel,
}

impl std::fmt::Display for MatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchAction::Start => write!(f, "start"),
            MatchAction::Declare => write!(f, "declare the result of"),
            MatchAction::Cancel => write!(f, "cancel"),
        }
    }
}

/// Permission seam for restricted transitions
#[cfg_attr(test, mockall::automock)]
pub trait ResultAuthority: Send + Sync {
    /// Whether `actor` may perform `action` on the match in `record`
    fn may_manage(&self, record: &MatchRecord, actor: &str, action: MatchAction) -> bool;

    /// Whether `actor` holds the moderator role
    fn is_moderator(&self, actor: &str) -> bool;
}

/// Captains of the match plus configured moderators
#[derive(Debug, Clone, Default)]
pub struct CaptainAuthority {
    moderators: HashSet<String>,
}

impl CaptainAuthority {
    pub fn new<I, S>(moderators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            moderators: moderators.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResultAuthority for CaptainAuthority {
    fn may_manage(&self, record: &MatchRecord, actor: &str, _action: MatchAction) -> bool {
        record.is_captain(actor) || self.is_moderator(actor)
    }

    fn is_moderator(&self, actor: &str) -> bool {
        self.moderators.contains(actor)
    }
}
