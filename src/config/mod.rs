//! Configuration module for the farm bot.
//!
//! Handles loading and validation of Telegram credentials, farming
//! behaviour settings and per-game endpoint profiles.

mod profile;
mod settings;

pub use profile::{Endpoints, GameProfile, InitDataFormat, PredictionEndpoints, ProfileError};
pub use settings::{ConfigError, FarmSettings, SettingsError, TelegramConfig};

/// Seconds in one daily-grant cycle.
pub const DAY_SECS: i64 = 86_400;

/// Delay added on top of a Telegram flood wait before retrying.
pub const FLOOD_WAIT_MARGIN_SECS: u64 = 3;

/// Login attempts made before giving up until the next cycle.
pub const LOGIN_ATTEMPTS: u32 = 3;
