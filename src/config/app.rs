//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! ranked-room service, including environment variable and TOML file loading
//! and validation.

use crate::ledger::StartingKit;
use crate::types::{ItemKind, TeamSize};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueSettings,
    pub matches: MatchSettings,
    pub economy: EconomySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Directory holding ledger.json and channels.json
    pub data_dir: PathBuf,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Team size used when a join does not name one (2, 3 or 4)
    pub default_team_size: u8,
    /// Waiting queues idle longer than this are discarded (0 disables)
    pub idle_timeout_seconds: u64,
}

/// Match lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// How long the item window stays open before the match starts on its own
    pub item_window_seconds: u64,
    /// How often expired item windows and idle queues are swept
    pub sweep_interval_seconds: u64,
    /// Players allowed to declare or cancel any match
    pub moderators: Vec<String>,
}

/// Point, currency and shop rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySettings {
    pub win_points: i64,
    pub loss_points: i64,
    pub mvp_bonus: i64,
    /// Coins every participant receives
    pub participation_coins: u64,
    /// Extra coins for the winning side
    pub win_bonus_coins: u64,
    pub double_token_price: u64,
    pub shield_token_price: u64,
    /// Largest quantity accepted by a single buy or sell
    pub max_trade_quantity: u32,
    pub daily_cooldown_hours: i64,
    pub starting_currency: u64,
    pub starting_double_tokens: u32,
    pub starting_shield_tokens: u32,
    /// When false, points are floored at 0
    pub allow_negative_points: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "ranked-room".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            data_dir: PathBuf::from("data"),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_team_size: 4,
            idle_timeout_seconds: 1800, // 30 minutes
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            item_window_seconds: 120, // 2 minutes
            sweep_interval_seconds: 15,
            moderators: Vec::new(),
        }
    }
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            win_points: 50,
            loss_points: -30,
            mvp_bonus: 25,
            participation_coins: 5,
            win_bonus_coins: 15,
            double_token_price: 5,
            shield_token_price: 5,
            max_trade_quantity: 50,
            daily_cooldown_hours: 20,
            starting_currency: 0,
            starting_double_tokens: 1,
            starting_shield_tokens: 1,
            allow_negative_points: false,
        }
    }
}

impl EconomySettings {
    /// Shop price of one unit, used for both buying and selling
    pub fn price(&self, item: ItemKind) -> u64 {
        match item {
            ItemKind::DoubleToken => self.double_token_price,
            ItemKind::ShieldToken => self.shield_token_price,
        }
    }

    pub fn starting_kit(&self) -> StartingKit {
        StartingKit {
            currency: self.starting_currency,
            double_tokens: self.starting_double_tokens,
            shield_tokens: self.starting_shield_tokens,
        }
    }

    pub fn daily_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.daily_cooldown_hours)
    }
}

/// Parse an environment variable if it is set
fn env_override<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Some(name) = env_override("SERVICE_NAME")? {
            self.service.name = name;
        }
        if let Some(log_level) = env_override("LOG_LEVEL")? {
            self.service.log_level = log_level;
        }
        if let Some(port) = env_override("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(dir) = env_override::<String>("DATA_DIR")? {
            self.service.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = env_override("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Queue settings
        if let Some(size) = env_override("DEFAULT_TEAM_SIZE")? {
            self.queue.default_team_size = size;
        }
        if let Some(idle) = env_override("QUEUE_IDLE_TIMEOUT_SECONDS")? {
            self.queue.idle_timeout_seconds = idle;
        }

        // Match settings
        if let Some(window) = env_override("ITEM_WINDOW_SECONDS")? {
            self.matches.item_window_seconds = window;
        }
        if let Some(sweep) = env_override("SWEEP_INTERVAL_SECONDS")? {
            self.matches.sweep_interval_seconds = sweep;
        }
        if let Some(moderators) = env_override::<String>("MODERATORS")? {
            self.matches.moderators = moderators
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }

        // Economy settings
        if let Some(points) = env_override("WIN_POINTS")? {
            self.economy.win_points = points;
        }
        if let Some(points) = env_override("LOSS_POINTS")? {
            self.economy.loss_points = points;
        }
        if let Some(bonus) = env_override("MVP_BONUS")? {
            self.economy.mvp_bonus = bonus;
        }
        if let Some(hours) = env_override("DAILY_COOLDOWN_HOURS")? {
            self.economy.daily_cooldown_hours = hours;
        }
        if let Some(allow) = env_override("ALLOW_NEGATIVE_POINTS")? {
            self.economy.allow_negative_points = allow;
        }

        Ok(())
    }

    /// Team size used when a join names none
    pub fn default_team_size(&self) -> TeamSize {
        TeamSize::try_from(self.queue.default_team_size).unwrap_or(TeamSize::Squad)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.matches.sweep_interval_seconds)
    }

    pub fn item_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.matches.item_window_seconds as i64)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.data_dir.as_os_str().is_empty() {
        return Err(anyhow!("Data directory cannot be empty"));
    }

    TeamSize::try_from(config.queue.default_team_size).map_err(|e| anyhow!(e))?;

    if config.matches.item_window_seconds == 0 {
        return Err(anyhow!("Item window must be greater than 0"));
    }
    if config.matches.sweep_interval_seconds == 0 {
        return Err(anyhow!("Sweep interval must be greater than 0"));
    }

    let economy = &config.economy;
    if economy.win_points < 0 {
        return Err(anyhow!("Win points cannot be negative"));
    }
    if economy.loss_points > 0 {
        return Err(anyhow!("Loss points cannot be positive"));
    }
    if economy.mvp_bonus < 0 {
        return Err(anyhow!("MVP bonus cannot be negative"));
    }
    if economy.daily_cooldown_hours <= 0 {
        return Err(anyhow!("Daily cooldown must be greater than 0"));
    }
    if economy.max_trade_quantity == 0 {
        return Err(anyhow!("Max trade quantity must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        validate_config(&config).unwrap();
        assert_eq!(config.default_team_size(), TeamSize::Squad);
        assert_eq!(config.economy.price(ItemKind::ShieldToken), 5);
        assert_eq!(config.economy.starting_kit().double_tokens, 1);
        assert_eq!(config.economy.daily_cooldown(), chrono::Duration::hours(20));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.queue.default_team_size = 5;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.economy.loss_points = 10;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranked-room.toml");
        std::fs::write(
            &path,
            "[economy]\nwin_points = 60\n\n[matches]\nmoderators = [\"mod-1\"]\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.economy.win_points, 60);
        assert_eq!(config.economy.loss_points, -30);
        assert_eq!(config.matches.moderators, vec!["mod-1".to_string()]);
        assert_eq!(config.service.health_port, 8080);
    }
}
