//! The ranked player profile and the values derived from it

use crate::error::{LadderError, Result};
use crate::types::{ItemKind, PlayerId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named point bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    /// Lower bound (inclusive) of every tier above Bronze
    pub const THRESHOLDS: [(i64, Tier); 4] = [
        (100, Tier::Silver),
        (250, Tier::Gold),
        (500, Tier::Platinum),
        (800, Tier::Diamond),
    ];

    pub fn from_points(points: i64) -> Tier {
        Self::THRESHOLDS
            .iter()
            .rev()
            .find(|(floor, _)| points >= *floor)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Bronze)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
        };
        write!(f, "{}", name)
    }
}

/// Medal granted when a win streak reaches a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StreakMedal {
    Streak3,
    Streak5,
    Streak10,
}

impl StreakMedal {
    pub const ALL: [StreakMedal; 3] = [
        StreakMedal::Streak3,
        StreakMedal::Streak5,
        StreakMedal::Streak10,
    ];

    pub fn threshold(self) -> u32 {
        match self {
            StreakMedal::Streak3 => 3,
            StreakMedal::Streak5 => 5,
            StreakMedal::Streak10 => 10,
        }
    }

    /// Medal earned by a streak that has just become `streak`
    pub fn crossed_at(streak: u32) -> Option<StreakMedal> {
        Self::ALL.into_iter().find(|medal| medal.threshold() == streak)
    }
}

/// Item counts owned by a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub double_tokens: u32,
    pub shield_tokens: u32,
}

impl Inventory {
    pub fn count(&self, item: ItemKind) -> u32 {
        match item {
            ItemKind::DoubleToken => self.double_tokens,
            ItemKind::ShieldToken => self.shield_tokens,
        }
    }

    fn slot(&mut self, item: ItemKind) -> &mut u32 {
        match item {
            ItemKind::DoubleToken => &mut self.double_tokens,
            ItemKind::ShieldToken => &mut self.shield_tokens,
        }
    }
}

/// What a freshly created profile starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingKit {
    pub currency: u64,
    pub double_tokens: u32,
    pub shield_tokens: u32,
}

impl Default for StartingKit {
    fn default() -> Self {
        Self {
            currency: 0,
            double_tokens: 1,
            shield_tokens: 1,
        }
    }
}

/// A community member's ranked ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub points: i64,
    pub tier: Tier,
    /// Consecutive unprotected wins
    pub streak: u32,
    pub max_streak: u32,
    pub currency: u64,
    pub inventory: Inventory,
    /// Times each medal has been earned
    pub medals: BTreeMap<StreakMedal, u32>,
    pub last_daily_claim: Option<DateTime<Utc>>,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub mvps: u32,
    /// Bumped by the store on every committed write
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl PlayerProfile {
    /// Default profile for a player seen for the first time
    pub fn new(id: PlayerId, kit: StartingKit) -> Self {
        Self {
            id,
            points: 0,
            tier: Tier::Bronze,
            streak: 0,
            max_streak: 0,
            currency: kit.currency,
            inventory: Inventory {
                double_tokens: kit.double_tokens,
                shield_tokens: kit.shield_tokens,
            },
            medals: BTreeMap::new(),
            last_daily_claim: None,
            matches_played: 0,
            wins: 0,
            losses: 0,
            mvps: 0,
            version: 0,
            created_at: current_timestamp(),
        }
    }

    pub fn medal_count(&self, medal: StreakMedal) -> u32 {
        self.medals.get(&medal).copied().unwrap_or(0)
    }

    /// Remove coins, failing without effect when the balance is short
    pub fn spend(&mut self, amount: u64) -> Result<()> {
        if self.currency < amount {
            return Err(LadderError::InsufficientFunds {
                player_id: self.id.clone(),
                required: amount,
                available: self.currency,
            });
        }
        self.currency -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: u64) {
        self.currency = self.currency.saturating_add(amount);
    }

    /// Remove items, failing without effect when the inventory is short
    pub fn take_item(&mut self, item: ItemKind, quantity: u32) -> Result<()> {
        let available = self.inventory.count(item);
        if available < quantity {
            return Err(LadderError::InsufficientInventory {
                player_id: self.id.clone(),
                item,
                required: quantity,
                available,
            });
        }
        *self.inventory.slot(item) -= quantity;
        Ok(())
    }

    pub fn give_item(&mut self, item: ItemKind, quantity: u32) {
        let slot = self.inventory.slot(item);
        *slot = slot.saturating_add(quantity);
    }

    /// Re-derive the tier from the current points
    pub fn refresh_tier(&mut self) {
        self.tier = Tier::from_points(self.points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::from_points(-20), Tier::Bronze);
        assert_eq!(Tier::from_points(99), Tier::Bronze);
        assert_eq!(Tier::from_points(100), Tier::Silver);
        assert_eq!(Tier::from_points(249), Tier::Silver);
        assert_eq!(Tier::from_points(250), Tier::Gold);
        assert_eq!(Tier::from_points(500), Tier::Platinum);
        assert_eq!(Tier::from_points(800), Tier::Diamond);
        assert_eq!(Tier::from_points(5000), Tier::Diamond);
    }

    #[test]
    fn test_new_profile_defaults() {
        let profile = PlayerProfile::new("p1".to_string(), StartingKit::default());
        assert_eq!(profile.points, 0);
        assert_eq!(profile.tier, Tier::Bronze);
        assert_eq!(profile.inventory.count(ItemKind::DoubleToken), 1);
        assert_eq!(profile.inventory.count(ItemKind::ShieldToken), 1);
        assert_eq!(profile.currency, 0);
        assert_eq!(profile.version, 0);
        assert!(profile.last_daily_claim.is_none());
    }

    #[test]
    fn test_spend_is_all_or_nothing() {
        let mut profile = PlayerProfile::new("p1".to_string(), StartingKit::default());
        profile.credit(7);

        let err = profile.spend(10).unwrap_err();
        assert!(matches!(err, LadderError::InsufficientFunds { available: 7, .. }));
        assert_eq!(profile.currency, 7);

        profile.spend(7).unwrap();
        assert_eq!(profile.currency, 0);
    }

    #[test]
    fn test_take_item_never_goes_negative() {
        let mut profile = PlayerProfile::new("p1".to_string(), StartingKit::default());
        assert!(profile.take_item(ItemKind::ShieldToken, 2).is_err());
        assert_eq!(profile.inventory.shield_tokens, 1);

        profile.take_item(ItemKind::ShieldToken, 1).unwrap();
        assert_eq!(profile.inventory.shield_tokens, 0);

        profile.give_item(ItemKind::ShieldToken, 3);
        assert_eq!(profile.inventory.shield_tokens, 3);
    }

    #[test]
    fn test_medal_crossing() {
        assert_eq!(StreakMedal::crossed_at(3), Some(StreakMedal::Streak3));
        assert_eq!(StreakMedal::crossed_at(4), None);
        assert_eq!(StreakMedal::crossed_at(10), Some(StreakMedal::Streak10));
    }
}
