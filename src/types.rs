//! Common types used throughout the ranked matchmaking core

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a community member
pub type PlayerId = String;

/// Identifier of the voice/group context a queue lives in
pub type ContextId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Players per team. A queue of size `n` needs `2n` members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TeamSize {
    Duo,
    Trio,
    Squad,
}

impl TeamSize {
    /// Players on one team
    pub fn per_team(self) -> usize {
        match self {
            TeamSize::Duo => 2,
            TeamSize::Trio => 3,
            TeamSize::Squad => 4,
        }
    }

    /// Players needed to fill a queue of this size
    pub fn players_needed(self) -> usize {
        self.per_team() * 2
    }
}

impl TryFrom<u8> for TeamSize {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            2 => Ok(TeamSize::Duo),
            3 => Ok(TeamSize::Trio),
            4 => Ok(TeamSize::Squad),
            other => Err(format!("team size must be 2, 3 or 4 (got {})", other)),
        }
    }
}

impl From<TeamSize> for u8 {
    fn from(size: TeamSize) -> Self {
        size.per_team() as u8
    }
}

impl std::fmt::Display for TeamSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.per_team();
        write!(f, "{}v{}", n, n)
    }
}

/// Consumable match items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// Doubles the signed point delta of the match
    DoubleToken,
    /// Nullifies the point and streak penalty of a loss
    ShieldToken,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::DoubleToken, ItemKind::ShieldToken];
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::DoubleToken => write!(f, "DoubleToken"),
            ItemKind::ShieldToken => write!(f, "ShieldToken"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "double" | "doubletoken" | "x2" => Ok(ItemKind::DoubleToken),
            "shield" | "shieldtoken" => Ok(ItemKind::ShieldToken),
            other => Err(format!("unknown item '{}'", other)),
        }
    }
}

/// One side of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

/// Outcome stored on a match record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Pending,
    TeamAWin,
    TeamBWin,
    Cancelled,
}

impl MatchResult {
    pub fn for_winner(team: Team) -> Self {
        match team {
            Team::A => MatchResult::TeamAWin,
            Team::B => MatchResult::TeamBWin,
        }
    }

    pub fn winner(self) -> Option<Team> {
        match self {
            MatchResult::TeamAWin => Some(Team::A),
            MatchResult::TeamBWin => Some(Team::B),
            MatchResult::Pending | MatchResult::Cancelled => None,
        }
    }

    pub fn is_pending(self) -> bool {
        self == MatchResult::Pending
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchResult::Pending => write!(f, "pending"),
            MatchResult::TeamAWin => write!(f, "team A win"),
            MatchResult::TeamBWin => write!(f, "team B win"),
            MatchResult::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Keys accepted by ranking queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKey {
    Points,
    Wins,
    Losses,
    MaxStreak,
    Currency,
}

impl std::str::FromStr for RankingKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "points" => Ok(RankingKey::Points),
            "wins" => Ok(RankingKey::Wins),
            "losses" => Ok(RankingKey::Losses),
            "streak" | "max_streak" => Ok(RankingKey::MaxStreak),
            "currency" | "coins" => Ok(RankingKey::Currency),
            other => Err(format!("unknown ranking key '{}'", other)),
        }
    }
}
