//! Configuration management for the ranked-room service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, default values, and the persisted channel bindings.

pub mod app;
pub mod channels;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, EconomySettings, MatchSettings, QueueSettings, ServiceSettings,
};
pub use channels::{ChannelBindingStore, ChannelBindings, ChannelPurpose};
