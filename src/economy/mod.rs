//! Economy Engine: settlement rewards, shop, gifts and daily rewards

pub mod daily;
pub mod engine;
pub mod rewards;

pub use daily::{DailyReward, DailyRewardTable};
pub use engine::{DailyClaim, EconomyEngine, GiftReceipt, PlayerProfileSummary, TradeReceipt};
pub use rewards::{Participation, PlayerOutcome, RewardRules};
