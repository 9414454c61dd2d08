//! Shop, gifting and daily rewards
//!
//! Every operation is one optimistic ledger write, so a failure (short
//! balance, short inventory, cooldown) leaves both profiles untouched.

use crate::config::EconomySettings;
use crate::economy::daily::{DailyReward, DailyRewardTable};
use crate::error::{LadderError, Result};
use crate::ledger::{Ledger, PlayerProfile};
use crate::types::{ItemKind, PlayerId};
use crate::utils::hours_until;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of a shop purchase or sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub player_id: PlayerId,
    pub item: ItemKind,
    pub quantity: u32,
    pub unit_price: u64,
    pub total: u64,
    pub currency_after: u64,
    pub items_after: u32,
}

/// Outcome of a currency gift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftReceipt {
    pub from: PlayerId,
    pub to: PlayerId,
    pub amount: u64,
    pub sender_balance: u64,
    pub recipient_balance: u64,
}

/// Outcome of a daily claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClaim {
    pub player_id: PlayerId,
    pub reward: DailyReward,
    pub claimed_at: DateTime<Utc>,
    pub next_claim_at: DateTime<Utc>,
    pub profile: PlayerProfileSummary,
}

/// Balances after an economy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfileSummary {
    pub currency: u64,
    pub double_tokens: u32,
    pub shield_tokens: u32,
}

impl From<&PlayerProfile> for PlayerProfileSummary {
    fn from(profile: &PlayerProfile) -> Self {
        Self {
            currency: profile.currency,
            double_tokens: profile.inventory.double_tokens,
            shield_tokens: profile.inventory.shield_tokens,
        }
    }
}

/// Balance transfers layered on the ledger
#[derive(Clone)]
pub struct EconomyEngine {
    ledger: Ledger,
    settings: EconomySettings,
    daily_table: DailyRewardTable,
}

impl EconomyEngine {
    pub fn new(ledger: Ledger, settings: EconomySettings) -> Self {
        Self::with_daily_table(ledger, settings, DailyRewardTable::default())
    }

    pub fn with_daily_table(
        ledger: Ledger,
        settings: EconomySettings,
        daily_table: DailyRewardTable,
    ) -> Self {
        Self {
            ledger,
            settings,
            daily_table,
        }
    }

    pub fn settings(&self) -> &EconomySettings {
        &self.settings
    }

    fn check_quantity(&self, quantity: u32) -> Result<()> {
        if quantity == 0 || quantity > self.settings.max_trade_quantity {
            return Err(LadderError::validation(format!(
                "quantity must be between 1 and {} (got {})",
                self.settings.max_trade_quantity, quantity
            )));
        }
        Ok(())
    }

    /// Buy `quantity` units of `item` at the shop price
    pub fn buy(&self, player_id: &str, item: ItemKind, quantity: u32) -> Result<TradeReceipt> {
        self.check_quantity(quantity)?;
        let unit_price = self.settings.price(item);
        let total = unit_price.saturating_mul(u64::from(quantity));

        let (profile, ()) = self.ledger.update_profile(player_id, |profile| {
            profile.spend(total)?;
            profile.give_item(item, quantity);
            Ok(())
        })?;

        info!(
            "Player '{}' bought {}x {} for {} coins",
            player_id, quantity, item, total
        );
        Ok(TradeReceipt {
            player_id: player_id.to_string(),
            item,
            quantity,
            unit_price,
            total,
            currency_after: profile.currency,
            items_after: profile.inventory.count(item),
        })
    }

    /// Sell `quantity` owned units of `item` back at the shop price
    pub fn sell(&self, player_id: &str, item: ItemKind, quantity: u32) -> Result<TradeReceipt> {
        self.check_quantity(quantity)?;
        let unit_price = self.settings.price(item);
        let total = unit_price.saturating_mul(u64::from(quantity));

        let (profile, ()) = self.ledger.update_profile(player_id, |profile| {
            profile.take_item(item, quantity)?;
            profile.credit(total);
            Ok(())
        })?;

        info!(
            "Player '{}' sold {}x {} for {} coins",
            player_id, quantity, item, total
        );
        Ok(TradeReceipt {
            player_id: player_id.to_string(),
            item,
            quantity,
            unit_price,
            total,
            currency_after: profile.currency,
            items_after: profile.inventory.count(item),
        })
    }

    /// Move `amount` coins from one player to another
    pub fn gift(&self, from: &str, to: &str, amount: i64) -> Result<GiftReceipt> {
        if from == to {
            return Err(LadderError::validation("cannot gift coins to yourself"));
        }
        if amount <= 0 {
            return Err(LadderError::validation(format!(
                "gift amount must be positive (got {})",
                amount
            )));
        }
        let amount = amount as u64;

        let (sender, recipient, ()) = self.ledger.update_pair(from, to, |sender, recipient| {
            sender.spend(amount)?;
            recipient.credit(amount);
            Ok(())
        })?;

        info!("Player '{}' gifted {} coins to '{}'", from, amount, to);
        Ok(GiftReceipt {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            sender_balance: sender.currency,
            recipient_balance: recipient.currency,
        })
    }

    /// Grant a random daily reward unless the cooldown is still running
    pub fn claim_daily<R: Rng + ?Sized>(
        &self,
        player_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<DailyClaim> {
        let cooldown = self.settings.daily_cooldown();
        // Drawn once so a retried write grants the same reward
        let reward = self.daily_table.roll(rng);

        let (profile, ()) = self.ledger.update_profile(player_id, |profile| {
            if let Some(last) = profile.last_daily_claim {
                let ready_at = last + cooldown;
                if now < ready_at {
                    return Err(LadderError::CooldownActive {
                        remaining_hours: hours_until(now, ready_at),
                    });
                }
            }

            match reward {
                DailyReward::Coins(amount) => profile.credit(amount),
                DailyReward::Item(item) => profile.give_item(item, 1),
            }
            profile.last_daily_claim = Some(now);
            Ok(())
        })?;

        info!("Player '{}' claimed daily reward: {}", player_id, reward);
        Ok(DailyClaim {
            player_id: player_id.to_string(),
            reward,
            claimed_at: now,
            next_claim_at: now + cooldown,
            profile: PlayerProfileSummary::from(&profile),
        })
    }
}
