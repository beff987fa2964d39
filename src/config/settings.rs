//! Application settings and Telegram configuration.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Telegram API configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Directory holding one `<name>.session` file per account.
    pub sessions_dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            sessions_dir: default_sessions_dir(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID` and `TG_API_HASH` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let sessions_dir = std::env::var("TG_SESSIONS_DIR")
            .map_or_else(|_| default_sessions_dir(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            sessions_dir,
        })
    }

    /// Path of the session file for the named account.
    #[must_use]
    pub fn session_path(&self, name: &str) -> PathBuf {
        self.sessions_dir.join(format!("{name}.session"))
    }

    /// Lists account names that have a session file, sorted.
    pub fn list_sessions(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.sessions_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "session")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Farming behaviour shared by every account in the process.
#[derive(Debug, Clone)]
pub struct FarmSettings {
    /// Length of one farming session in seconds.
    pub farm_time_secs: i64,

    /// Inclusive range of taps reported when finishing a session.
    pub taps_count: (u64, u64),

    /// Points added to the balance when claiming the moon bonus.
    pub moon_bonus: i64,

    pub buy_boost: bool,
    pub auto_task: bool,
    pub claim_moon: bool,
    pub use_ref: bool,

    /// Boost id bought when no boost is active.
    pub default_boost: String,

    /// Boost id to cost table.
    pub boosters: BTreeMap<String, i64>,

    pub auto_predict: bool,

    /// Guess randomly instead of following the price trend.
    pub predict_random: bool,

    /// Predictions stop once the combo reaches this value.
    pub max_combo: u32,

    /// Optional proxy for the game API client.
    pub proxy_url: Option<String>,

    /// Window (seconds) from which the token lifetime is drawn.
    pub token_ttl_secs: (u64, u64),

    /// Window (seconds) from which the idle sleep between cycles is drawn.
    pub sleep_secs: (u64, u64),
}

fn default_boosters() -> BTreeMap<String, i64> {
    BTreeMap::from([
        ("x2".to_owned(), 4_000_000),
        ("x3".to_owned(), 30_000_000),
        ("x5".to_owned(), 200_000_000),
    ])
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            farm_time_secs: 21_600,
            taps_count: (100_000, 500_000),
            moon_bonus: 1_000_000,
            buy_boost: true,
            auto_task: true,
            claim_moon: true,
            use_ref: true,
            default_boost: "x5".to_owned(),
            boosters: default_boosters(),
            auto_predict: false,
            predict_random: false,
            max_combo: 5,
            proxy_url: None,
            token_ttl_secs: (3500, 3700),
            sleep_secs: (3500, 3600),
        }
    }
}

impl FarmSettings {
    /// Creates farm settings from environment variables with defaults.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            farm_time_secs: parsed("FARM_TIME")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.farm_time_secs),
            taps_count: parsed("TAPS_COUNT")
                .and_then(|s| parse_pair(&s))
                .unwrap_or(defaults.taps_count),
            moon_bonus: parsed("MOON_BONUS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.moon_bonus),
            buy_boost: parsed("BUY_BOOST")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.buy_boost),
            auto_task: parsed("AUTO_TASK")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.auto_task),
            claim_moon: parsed("CLAIM_MOON")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.claim_moon),
            use_ref: parsed("USE_REF")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.use_ref),
            default_boost: parsed("DEFAULT_BOOST")
                .map(|s| s.trim().to_owned())
                .unwrap_or(defaults.default_boost),
            boosters: parsed("BOOSTERS")
                .and_then(|s| parse_boosters(&s))
                .unwrap_or(defaults.boosters),
            auto_predict: parsed("AUTO_PREDICT")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.auto_predict),
            predict_random: parsed("PREDICT_RANDOM")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.predict_random),
            max_combo: parsed("MAX_COMBO")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_combo),
            proxy_url: parsed("PROXY_URL").map(|s| s.trim().to_owned()),
            token_ttl_secs: parsed("TOKEN_TTL")
                .and_then(|s| parse_pair(&s))
                .unwrap_or(defaults.token_ttl_secs),
            sleep_secs: parsed("SLEEP_RANGE")
                .and_then(|s| parse_pair(&s))
                .unwrap_or(defaults.sleep_secs),
        }
    }

    /// Checks ranges and the boost table for consistency.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, (min, max)) in [
            ("TAPS_COUNT", self.taps_count),
            ("TOKEN_TTL", self.token_ttl_secs),
            ("SLEEP_RANGE", self.sleep_secs),
        ] {
            if min > max {
                return Err(SettingsError::InvalidRange { name, min, max });
            }
        }

        if self.farm_time_secs <= 0 {
            return Err(SettingsError::InvalidFarmTime(self.farm_time_secs));
        }

        if self.buy_boost && !self.boosters.contains_key(&self.default_boost) {
            return Err(SettingsError::UnknownBoost(self.default_boost.clone()));
        }

        Ok(())
    }

    /// Tap range as an inclusive range.
    #[must_use]
    pub const fn taps_range(&self) -> RangeInclusive<u64> {
        self.taps_count.0..=self.taps_count.1
    }

    /// Cost of the configured default boost, if it is in the table.
    #[must_use]
    pub fn default_boost_cost(&self) -> Option<i64> {
        self.boosters.get(&self.default_boost).copied()
    }
}

/// Parses `"a,b"` (or `"[a, b]"`) into an ordered pair.
fn parse_pair(s: &str) -> Option<(u64, u64)> {
    let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
    let mut parts = trimmed.split(',').map(str::trim);
    let min = parts.next()?.parse().ok()?;
    let max = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((min, max))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses `"x2:4000000,x3:30000000"` into a boost cost table.
fn parse_boosters(s: &str) -> Option<BTreeMap<String, i64>> {
    let mut table = BTreeMap::new();
    for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, cost) = entry.split_once(':')?;
        table.insert(id.trim().to_owned(), cost.trim().parse().ok()?);
    }
    (!table.is_empty()).then_some(table)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}

/// Farm settings that cannot be used as configured.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} range is inverted: {min} > {max}")]
    InvalidRange {
        name: &'static str,
        min: u64,
        max: u64,
    },

    #[error("FARM_TIME must be positive, got {0}")]
    InvalidFarmTime(i64),

    #[error("DEFAULT_BOOST {0:?} is not listed in BOOSTERS")]
    UnknownBoost(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = FarmSettings::default();
        assert_eq!(settings.farm_time_secs, 21_600);
        assert_eq!(settings.taps_count, (100_000, 500_000));
        assert_eq!(settings.default_boost_cost(), Some(200_000_000));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(
            config.session_path("alice"),
            PathBuf::from("sessions/alice.session")
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let settings = FarmSettings::from_lookup(lookup(&[
            ("TAPS_COUNT", "[10, 20]"),
            ("BUY_BOOST", "False"),
            ("DEFAULT_BOOST", "x2"),
            ("BOOSTERS", "x2:100, x3:300"),
            ("MAX_COMBO", "3"),
            ("PROXY_URL", "socks5://127.0.0.1:9050"),
        ]));
        assert_eq!(settings.taps_count, (10, 20));
        assert!(!settings.buy_boost);
        assert_eq!(settings.default_boost_cost(), Some(100));
        assert_eq!(settings.max_combo, 3);
        assert_eq!(settings.proxy_url.as_deref(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let settings = FarmSettings::from_lookup(lookup(&[
            ("FARM_TIME", "soon"),
            ("TAPS_COUNT", "1,2,3"),
            ("AUTO_TASK", "maybe"),
            ("BOOSTERS", "x2"),
            ("PROXY_URL", "  "),
        ]));
        let defaults = FarmSettings::default();
        assert_eq!(settings.farm_time_secs, defaults.farm_time_secs);
        assert_eq!(settings.taps_count, defaults.taps_count);
        assert!(settings.auto_task);
        assert_eq!(settings.boosters, defaults.boosters);
        assert!(settings.proxy_url.is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_boost() {
        let settings = FarmSettings {
            default_boost: "x9".to_owned(),
            ..FarmSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::UnknownBoost(id)) if id == "x9"
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let settings = FarmSettings {
            sleep_secs: (10, 5),
            ..FarmSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidRange { name: "SLEEP_RANGE", .. })
        ));
    }

    #[test]
    fn test_list_sessions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bob.session"), b"").unwrap();
        std::fs::write(dir.path().join("alice.session"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let config = TelegramConfig {
            sessions_dir: dir.path().to_path_buf(),
            ..TelegramConfig::new(1, "hash".to_owned())
        };
        assert_eq!(config.list_sessions().unwrap(), vec!["alice", "bob"]);
    }
}
