//! Settlement rules: point deltas, streaks, medals and match pay
//!
//! The per-player computation, in order:
//! 1. base delta from the result (win or loss points)
//! 2. MVP bonus added to a positive delta
//! 3. DoubleToken multiplies the signed delta by two
//! 4. ShieldToken turns a negative delta into zero
//! 5. points move by the delta, floored at 0 unless negative points are allowed
//! 6. streak grows on a win, resets on an unshielded loss, holds on a shielded one
//! 7. coins: participation plus a win bonus, independent of items
//! 8. tier is re-derived from points
//! 9. a medal is granted when the streak lands exactly on 3, 5 or 10

use crate::config::EconomySettings;
use crate::ledger::{PlayerProfile, StreakMedal, Tier};
use crate::types::{ItemKind, PlayerId};
use serde::{Deserialize, Serialize};

/// How a player took part in a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participation {
    pub won: bool,
    pub mvp: bool,
    pub item: Option<ItemKind>,
}

/// Everything settlement changed for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOutcome {
    pub player_id: PlayerId,
    pub won: bool,
    pub mvp: bool,
    pub item: Option<ItemKind>,
    /// Delta from the reward table after items, before the points floor
    pub rated_delta: i64,
    /// Change actually applied to the player's points
    pub point_delta: i64,
    pub points_after: i64,
    pub currency_delta: u64,
    pub streak_after: u32,
    pub shielded: bool,
    pub tier_before: Tier,
    pub tier_after: Tier,
    pub medal: Option<StreakMedal>,
}

/// Fixed reward table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRules {
    pub win_points: i64,
    pub loss_points: i64,
    pub mvp_bonus: i64,
    pub participation_coins: u64,
    pub win_bonus_coins: u64,
    pub allow_negative_points: bool,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self::from_settings(&EconomySettings::default())
    }
}

impl RewardRules {
    pub fn from_settings(settings: &EconomySettings) -> Self {
        Self {
            win_points: settings.win_points,
            loss_points: settings.loss_points,
            mvp_bonus: settings.mvp_bonus,
            participation_coins: settings.participation_coins,
            win_bonus_coins: settings.win_bonus_coins,
            allow_negative_points: settings.allow_negative_points,
        }
    }

    /// Signed point delta for a participation (steps 1-4)
    pub fn point_delta(&self, participation: &Participation) -> i64 {
        let mut delta = if participation.won {
            self.win_points
        } else {
            self.loss_points
        };

        if participation.mvp && delta > 0 {
            delta += self.mvp_bonus;
        }

        match participation.item {
            Some(ItemKind::DoubleToken) => delta * 2,
            Some(ItemKind::ShieldToken) if delta < 0 => 0,
            _ => delta,
        }
    }

    /// Coins paid for a participation (step 7)
    pub fn currency_delta(&self, participation: &Participation) -> u64 {
        if participation.won {
            self.participation_coins + self.win_bonus_coins
        } else {
            self.participation_coins
        }
    }

    /// Apply a finished match to `profile` and report what changed
    pub fn apply(&self, profile: &mut PlayerProfile, participation: &Participation) -> PlayerOutcome {
        let tier_before = profile.tier;
        let rated_delta = self.point_delta(participation);
        let shielded = !participation.won
            && participation.item == Some(ItemKind::ShieldToken)
            && self.loss_points < 0;

        let mut points = profile.points + rated_delta;
        if !self.allow_negative_points {
            points = points.max(0);
        }
        let point_delta = points - profile.points;
        profile.points = points;

        let mut medal = None;
        if participation.won {
            profile.streak += 1;
            profile.max_streak = profile.max_streak.max(profile.streak);
            medal = StreakMedal::crossed_at(profile.streak);
            if let Some(medal) = medal {
                *profile.medals.entry(medal).or_insert(0) += 1;
            }
            profile.wins += 1;
        } else {
            if !shielded {
                profile.streak = 0;
            }
            profile.losses += 1;
        }

        if participation.mvp {
            profile.mvps += 1;
        }
        profile.matches_played += 1;

        let currency_delta = self.currency_delta(participation);
        profile.credit(currency_delta);
        profile.refresh_tier();

        PlayerOutcome {
            player_id: profile.id.clone(),
            won: participation.won,
            mvp: participation.mvp,
            item: participation.item,
            rated_delta,
            point_delta,
            points_after: profile.points,
            currency_delta,
            streak_after: profile.streak,
            shielded,
            tier_before,
            tier_after: profile.tier,
            medal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StartingKit;

    fn player(points: i64, streak: u32) -> PlayerProfile {
        let mut p = PlayerProfile::new("p1".to_string(), StartingKit::default());
        p.points = points;
        p.streak = streak;
        p.max_streak = streak;
        p.refresh_tier();
        p
    }

    fn win(mvp: bool, item: Option<ItemKind>) -> Participation {
        Participation {
            won: true,
            mvp,
            item,
        }
    }

    fn loss(item: Option<ItemKind>) -> Participation {
        Participation {
            won: false,
            mvp: false,
            item,
        }
    }

    #[test]
    fn test_base_deltas() {
        let rules = RewardRules::default();
        assert_eq!(rules.point_delta(&win(false, None)), 50);
        assert_eq!(rules.point_delta(&win(true, None)), 75);
        assert_eq!(rules.point_delta(&loss(None)), -30);
    }

    #[test]
    fn test_double_token_doubles_signed_delta() {
        let rules = RewardRules::default();
        assert_eq!(rules.point_delta(&win(false, Some(ItemKind::DoubleToken))), 100);
        assert_eq!(rules.point_delta(&win(true, Some(ItemKind::DoubleToken))), 150);
        assert_eq!(rules.point_delta(&loss(Some(ItemKind::DoubleToken))), -60);
    }

    #[test]
    fn test_shield_only_affects_losses() {
        let rules = RewardRules::default();
        assert_eq!(rules.point_delta(&loss(Some(ItemKind::ShieldToken))), 0);
        assert_eq!(rules.point_delta(&win(false, Some(ItemKind::ShieldToken))), 50);
    }

    #[test]
    fn test_shielded_loss_keeps_points_and_streak() {
        let rules = RewardRules::default();
        let mut profile = player(200, 4);

        let outcome = rules.apply(&mut profile, &loss(Some(ItemKind::ShieldToken)));

        assert!(outcome.shielded);
        assert_eq!(outcome.point_delta, 0);
        assert_eq!(profile.points, 200);
        assert_eq!(profile.streak, 4);
        assert_eq!(profile.losses, 1);
        assert_eq!(profile.currency, 5);
    }

    #[test]
    fn test_unshielded_loss_resets_streak() {
        let rules = RewardRules::default();
        let mut profile = player(200, 4);

        let outcome = rules.apply(&mut profile, &loss(None));

        assert_eq!(outcome.point_delta, -30);
        assert_eq!(profile.points, 170);
        assert_eq!(profile.streak, 0);
        assert_eq!(profile.max_streak, 4);
    }

    #[test]
    fn test_points_floor_at_zero() {
        let rules = RewardRules::default();
        let mut profile = player(10, 0);

        let outcome = rules.apply(&mut profile, &loss(Some(ItemKind::DoubleToken)));

        assert_eq!(outcome.rated_delta, -60);
        assert_eq!(outcome.point_delta, -10);
        assert_eq!(profile.points, 0);
    }

    #[test]
    fn test_negative_points_when_allowed() {
        let rules = RewardRules {
            allow_negative_points: true,
            ..RewardRules::default()
        };
        let mut profile = player(10, 0);

        let outcome = rules.apply(&mut profile, &loss(None));

        assert_eq!(outcome.point_delta, -30);
        assert_eq!(profile.points, -20);
        assert_eq!(profile.tier, Tier::Bronze);
    }

    #[test]
    fn test_win_pays_coins_and_updates_tier() {
        let rules = RewardRules::default();
        let mut profile = player(80, 0);

        let outcome = rules.apply(&mut profile, &win(true, None));

        assert_eq!(outcome.point_delta, 75);
        assert_eq!(outcome.currency_delta, 20);
        assert_eq!(outcome.tier_before, Tier::Bronze);
        assert_eq!(outcome.tier_after, Tier::Silver);
        assert_eq!(profile.mvps, 1);
        assert_eq!(profile.wins, 1);
        assert_eq!(profile.matches_played, 1);
    }

    #[test]
    fn test_medals_granted_once_per_crossing() {
        let rules = RewardRules::default();
        let mut profile = player(0, 0);

        let medals: Vec<_> = (0..5)
            .map(|_| rules.apply(&mut profile, &win(false, None)).medal)
            .collect();
        assert_eq!(
            medals,
            vec![None, None, Some(StreakMedal::Streak3), None, Some(StreakMedal::Streak5)]
        );
        assert_eq!(profile.medal_count(StreakMedal::Streak3), 1);

        // A new run crosses 3 again
        rules.apply(&mut profile, &loss(None));
        for _ in 0..3 {
            rules.apply(&mut profile, &win(false, None));
        }
        assert_eq!(profile.medal_count(StreakMedal::Streak3), 2);
        assert_eq!(profile.medal_count(StreakMedal::Streak5), 1);
    }
}
