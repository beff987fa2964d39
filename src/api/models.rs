//! JSON models of the game backend.

use serde::{Deserialize, Serialize};

/// Response of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Farming session status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmStatus {
    #[serde(rename = "await")]
    Await,
    #[serde(rename = "inProgress")]
    InProgress,
    #[serde(other)]
    Unknown,
}

/// The current farming session.
#[derive(Debug, Clone, Deserialize)]
pub struct FarmSession {
    pub status: FarmStatus,
    /// Unix seconds when the session was started.
    #[serde(default)]
    pub start_at: Option<i64>,
    /// Unix seconds when the moon bonus was claimed.
    #[serde(default)]
    pub moon_time: Option<i64>,
}

/// Boost information attached to the account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfo {
    /// Active boost id (`"x5"`), if any.
    #[serde(default)]
    pub boost: Option<String>,
    #[serde(default)]
    pub active_booster_finish_at: Option<i64>,
}

/// Response of the farming info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FarmingInfo {
    pub balance: i64,
    /// Unix seconds of the first daily claim of the current streak.
    #[serde(default)]
    pub day_grant_first: Option<i64>,
    /// Number of daily grants claimed in the current streak.
    #[serde(default)]
    pub day_grant_day: i64,
    /// Server clock, unix seconds.
    pub system_time: i64,
    pub session: FarmSession,
    #[serde(default)]
    pub info: AccountInfo,
}

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Possible,
    Done,
    Granted,
    #[serde(other)]
    Unknown,
}

/// A promotional task.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub status: TaskStatus,
    /// Points granted on completion.
    #[serde(default)]
    pub grant: i64,
}

/// Response of the task completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCompleteResponse {
    pub task: Task,
    pub balance: i64,
}

/// Response of the daily claim endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyClaimResponse {
    pub balance: i64,
    #[serde(default)]
    pub day_grant_day: i64,
}

/// Response of the farming start endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StartFarmingResponse {
    pub status: FarmStatus,
}

/// Points earned by a finished session.
#[derive(Debug, Clone, Deserialize)]
pub struct FinishedSession {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub taps: i64,
}

/// Response of the farming finish endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FinishFarmingResponse {
    pub balance: i64,
    pub session: FinishedSession,
}

/// Response carrying only the new balance.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// Response of the boost purchase endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BoostPurchase {
    pub id: String,
    pub balance: i64,
}

/// Prediction mini-game state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionState {
    /// Guesses left.
    #[serde(default)]
    pub chances: u32,
    /// Current win streak, when the server reports one.
    #[serde(default)]
    pub combo: Option<u32>,
    /// Active prediction boost, if any.
    #[serde(default)]
    pub boost: Option<String>,
}

/// One price sample.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceTick {
    pub price: f64,
}

/// Guessed price direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Result of a submitted guess.
#[derive(Debug, Clone, Deserialize)]
pub struct BetOutcome {
    pub win: bool,
    #[serde(default)]
    pub combo: u32,
    #[serde(default)]
    pub chances: u32,
    #[serde(default)]
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farming_info_in_progress() {
        let json = r#"{
            "balance": 1500,
            "day_grant_first": 1700000000,
            "day_grant_day": 3,
            "system_time": 1700300000,
            "session": {"status": "inProgress", "start_at": 1700290000, "moon_time": null},
            "info": {"boost": "x5", "active_booster_finish_at": 1700400000}
        }"#;
        let info: FarmingInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.session.status, FarmStatus::InProgress);
        assert_eq!(info.session.start_at, Some(1_700_290_000));
        assert_eq!(info.info.boost.as_deref(), Some("x5"));
        assert_eq!(info.day_grant_day, 3);
    }

    #[test]
    fn test_farming_info_fresh_account() {
        let json = r#"{
            "balance": 0,
            "day_grant_first": null,
            "system_time": 1700000000,
            "session": {"status": "await"}
        }"#;
        let info: FarmingInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.session.status, FarmStatus::Await);
        assert!(info.day_grant_first.is_none());
        assert!(info.info.boost.is_none());
    }

    #[test]
    fn test_unknown_statuses_do_not_fail() {
        let session: FarmSession = serde_json::from_str(r#"{"status": "paused"}"#).unwrap();
        assert_eq!(session.status, FarmStatus::Unknown);

        let task: Task =
            serde_json::from_str(r#"{"id": 7, "type": "twitter", "status": "expired"}"#).unwrap();
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(task.kind, "twitter");
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
        assert_eq!(Direction::Down.to_string(), "down");
    }
}
