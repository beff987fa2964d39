//! Game profiles: the per-game bot identity and REST endpoint table.
//!
//! Every supported game exposes the same shape of API (login, farming
//! info/start/finish, daily grant, tasks, boosts), so the polling engine is
//! written once and pointed at a profile.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors that can occur while loading or validating a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile name is empty")]
    EmptyName,

    #[error("Bot username is empty")]
    EmptyBotUsername,

    #[error("Invalid URL in field {field}: {value} ({source})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[error("API base must end with '/': {0}")]
    ApiBaseWithoutSlash(String),

    #[error("Endpoint {field} is empty")]
    EmptyEndpoint { field: &'static str },

    #[error("Prediction round length must be > 0")]
    InvalidRoundLength,

    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse profile file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// How the web-app init data is sent to the login endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitDataFormat {
    /// Inner values percent-decoded (`user={"id":...}`).
    #[default]
    Decoded,
    /// Exactly as signed by Telegram.
    Raw,
}

/// Paths of the farming game endpoints, relative to `api_base`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub farming_info: String,
    pub farming_start: String,
    pub farming_finish: String,
    pub moon_claim: String,
    pub daily_claim: String,
    pub daily_reset: String,
    pub task_list: String,
    pub task_complete: String,
    pub task_claim: String,
    pub buy_boost: String,
}

impl Endpoints {
    /// Every endpoint path paired with its field name.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("login", self.login.as_str()),
            ("farming_info", self.farming_info.as_str()),
            ("farming_start", self.farming_start.as_str()),
            ("farming_finish", self.farming_finish.as_str()),
            ("moon_claim", self.moon_claim.as_str()),
            ("daily_claim", self.daily_claim.as_str()),
            ("daily_reset", self.daily_reset.as_str()),
            ("task_list", self.task_list.as_str()),
            ("task_complete", self.task_complete.as_str()),
            ("task_claim", self.task_claim.as_str()),
            ("buy_boost", self.buy_boost.as_str()),
        ]
    }
}

/// Endpoints of the price-prediction mini-game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionEndpoints {
    /// Chances, combo and boost state.
    pub state: String,
    /// Current price ticker.
    pub price: String,
    /// Submits a guess and returns its outcome.
    pub bet: String,
    /// Seconds between the two price samples.
    #[serde(default = "default_round_secs")]
    pub round_secs: u64,
}

fn default_round_secs() -> u64 {
    5
}

/// A complete game description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameProfile {
    /// Short name used in logs.
    pub name: String,

    /// Username of the game bot, without `@`.
    pub bot_username: String,

    /// URL passed when requesting the web view.
    pub web_app_url: String,

    /// Platform reported to Telegram.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Start parameter sent once when `USE_REF` is on.
    #[serde(default)]
    pub referral: Option<String>,

    /// Base URL all endpoint paths are joined onto.
    pub api_base: String,

    /// Value of the `Origin`/`Referer` headers.
    pub origin: String,

    #[serde(default)]
    pub init_data: InitDataFormat,

    /// JSON field carrying the init data in the login body.
    #[serde(default = "default_login_field")]
    pub login_field: String,

    /// Static file fetched after login the way the web app does.
    #[serde(default)]
    pub version_url: Option<String>,

    /// Task types that are completed automatically.
    #[serde(default)]
    pub task_types: Vec<String>,

    pub endpoints: Endpoints,

    #[serde(default)]
    pub prediction: Option<PredictionEndpoints>,
}

fn default_platform() -> String {
    "android".to_owned()
}

fn default_login_field() -> String {
    "initData".to_owned()
}

impl GameProfile {
    /// Loads a profile from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        Ok(profile)
    }

    /// Saves the profile to a JSON file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the profile, returning the first problem found.
    pub fn validate(&self) -> Result<(), ProfileError> {
        self.validate_all().into_iter().next().map_or(Ok(()), Err)
    }

    /// Returns every problem found in the profile.
    #[must_use]
    pub fn validate_all(&self) -> Vec<ProfileError> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ProfileError::EmptyName);
        }
        if self.bot_username.trim().is_empty() {
            issues.push(ProfileError::EmptyBotUsername);
        }

        let mut urls = vec![
            ("web_app_url", self.web_app_url.as_str()),
            ("api_base", self.api_base.as_str()),
            ("origin", self.origin.as_str()),
        ];
        if let Some(version_url) = &self.version_url {
            urls.push(("version_url", version_url.as_str()));
        }
        for (field, value) in urls {
            if let Err(source) = Url::parse(value) {
                issues.push(ProfileError::InvalidUrl {
                    field,
                    value: value.to_owned(),
                    source,
                });
            }
        }

        // Url::join drops the last segment of a base without a trailing slash
        if !self.api_base.ends_with('/') {
            issues.push(ProfileError::ApiBaseWithoutSlash(self.api_base.clone()));
        }

        for (field, path) in self.endpoints.fields() {
            if path.trim().is_empty() {
                issues.push(ProfileError::EmptyEndpoint { field });
            }
        }

        if let Some(prediction) = &self.prediction {
            for (field, path) in [
                ("prediction.state", &prediction.state),
                ("prediction.price", &prediction.price),
                ("prediction.bet", &prediction.bet),
            ] {
                if path.trim().is_empty() {
                    issues.push(ProfileError::EmptyEndpoint { field });
                }
            }
            if prediction.round_secs == 0 {
                issues.push(ProfileError::InvalidRoundLength);
            }
        }

        issues
    }

    /// Resolves an endpoint path against `api_base`.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.api_base)?.join(path.trim_start_matches('/'))
    }

    /// Whether a task type is completed automatically.
    #[must_use]
    pub fn accepts_task_type(&self, kind: &str) -> bool {
        self.task_types.iter().any(|t| t == kind)
    }

    /// Built-in profile for the MMBump game.
    #[must_use]
    pub fn mmbump() -> Self {
        Self {
            name: "mmbump".to_owned(),
            bot_username: "MMproBump_bot".to_owned(),
            web_app_url: "https://mmbump.pro/".to_owned(),
            platform: default_platform(),
            referral: Some("ref_722070301".to_owned()),
            api_base: "https://api.mmbump.pro/v1/".to_owned(),
            origin: "https://mmbump.pro".to_owned(),
            init_data: InitDataFormat::Decoded,
            login_field: default_login_field(),
            version_url: Some("https://mmbump.pro/version.json".to_owned()),
            task_types: vec!["twitter".to_owned()],
            endpoints: Endpoints {
                login: "login".to_owned(),
                farming_info: "farming".to_owned(),
                farming_start: "farming/start".to_owned(),
                farming_finish: "farming/finish".to_owned(),
                moon_claim: "farming/moon-claim".to_owned(),
                daily_claim: "grant-day/claim".to_owned(),
                daily_reset: "grant-day/reset".to_owned(),
                task_list: "task-list".to_owned(),
                task_complete: "task-list/complete".to_owned(),
                task_claim: "task-list/claim".to_owned(),
                buy_boost: "product-list/buy".to_owned(),
            },
            prediction: None,
        }
    }

    /// Creates an example profile for users to reference.
    ///
    /// Same as [`GameProfile::mmbump`] with the prediction table filled in
    /// so the file shows every field.
    #[must_use]
    pub fn example() -> Self {
        Self {
            prediction: Some(PredictionEndpoints {
                state: "prediction".to_owned(),
                price: "prediction/price".to_owned(),
                bet: "prediction/bet".to_owned(),
                round_secs: default_round_secs(),
            }),
            ..Self::mmbump()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profile_is_valid() {
        assert!(GameProfile::mmbump().validate().is_ok());
        assert!(GameProfile::example().validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_joins_base() {
        let profile = GameProfile::mmbump();
        let url = profile.endpoint_url(&profile.endpoints.task_complete).unwrap();
        assert_eq!(url.as_str(), "https://api.mmbump.pro/v1/task-list/complete");

        let url = profile.endpoint_url("/farming").unwrap();
        assert_eq!(url.as_str(), "https://api.mmbump.pro/v1/farming");
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut profile = GameProfile::mmbump();
        profile.name = String::new();
        profile.api_base = "https://api.example.com/v1".to_owned();
        profile.endpoints.login = " ".to_owned();
        profile.origin = "not a url".to_owned();

        let issues = profile.validate_all();
        assert_eq!(issues.len(), 4);
        assert!(matches!(issues[0], ProfileError::EmptyName));
        assert!(matches!(profile.validate(), Err(ProfileError::EmptyName)));
        assert!(
            issues
                .iter()
                .any(|e| matches!(e, ProfileError::EmptyEndpoint { field: "login" }))
        );
    }

    #[test]
    fn test_validation_zero_round() {
        let mut profile = GameProfile::example();
        if let Some(prediction) = profile.prediction.as_mut() {
            prediction.round_secs = 0;
        }
        assert!(matches!(profile.validate(), Err(ProfileError::InvalidRoundLength)));
    }

    #[test]
    fn test_accepts_task_type() {
        let profile = GameProfile::mmbump();
        assert!(profile.accepts_task_type("twitter"));
        assert!(!profile.accepts_task_type("telegram"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        let profile = GameProfile::example();
        profile.save_to_file(&path).unwrap();
        assert_eq!(GameProfile::load_from_file(&path).unwrap(), profile);
    }

    #[test]
    fn test_defaults_applied_on_load() {
        let json = r#"{
            "name": "tiny",
            "bot_username": "tiny_bot",
            "web_app_url": "https://tiny.example/",
            "api_base": "https://api.tiny.example/",
            "origin": "https://tiny.example",
            "endpoints": {
                "login": "auth", "farming_info": "farm", "farming_start": "farm/start",
                "farming_finish": "farm/finish", "moon_claim": "farm/bonus",
                "daily_claim": "daily", "daily_reset": "daily/reset",
                "task_list": "tasks", "task_complete": "tasks/done",
                "task_claim": "tasks/claim", "buy_boost": "shop/buy"
            }
        }"#;
        let profile: GameProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.platform, "android");
        assert_eq!(profile.login_field, "initData");
        assert_eq!(profile.init_data, InitDataFormat::Decoded);
        assert!(profile.prediction.is_none());
        assert!(profile.validate().is_ok());
    }
}
