//! Per-account session state.

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// In-memory state of one account's loop.
///
/// Nothing here is persisted; a restart simply logs in again.
#[derive(Debug)]
pub struct SessionState {
    /// Token returned by the game login.
    pub access_token: Option<String>,

    /// Telegram user id from the init data.
    pub user_id: Option<i64>,

    /// Telegram display name from the init data.
    pub user_name: Option<String>,

    /// When the current token was obtained.
    token_issued_at: Option<Instant>,

    /// Lifetime drawn for the current token.
    token_ttl: Duration,

    /// Range the token lifetime is drawn from.
    ttl_window: (u64, u64),

    /// Tasks whose grant has already been claimed by this process.
    granted_tasks: HashSet<i64>,
}

impl SessionState {
    /// Creates an unauthenticated state with a TTL window in seconds.
    #[must_use]
    pub fn new(ttl_window: (u64, u64)) -> Self {
        Self {
            access_token: None,
            user_id: None,
            user_name: None,
            token_issued_at: None,
            token_ttl: Duration::ZERO,
            ttl_window,
            granted_tasks: HashSet::new(),
        }
    }

    /// True without a token or once the token outlived its drawn TTL.
    #[must_use]
    pub fn needs_auth(&self) -> bool {
        match (&self.access_token, self.token_issued_at) {
            (Some(_), Some(issued)) => issued.elapsed() >= self.token_ttl,
            _ => true,
        }
    }

    /// Records a fresh token and draws a new lifetime for it.
    pub fn mark_authenticated(&mut self, token: String) {
        let (min, max) = self.ttl_window;
        self.access_token = Some(token);
        self.token_issued_at = Some(Instant::now());
        self.token_ttl = super::schedule::random_secs(min, max);
    }

    /// Drops the token so the next cycle re-authenticates.
    pub fn invalidate(&mut self) {
        self.access_token = None;
        self.token_issued_at = None;
    }

    /// Lifetime of the current token.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Whether a task's grant was already claimed.
    #[must_use]
    pub fn is_granted(&self, task_id: i64) -> bool {
        self.granted_tasks.contains(&task_id)
    }

    /// Records a claimed grant; false if it was already recorded.
    pub fn mark_granted(&mut self, task_id: i64) -> bool {
        self.granted_tasks.insert(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_needs_auth() {
        let state = SessionState::new((3500, 3700));
        assert!(state.needs_auth());
    }

    #[test]
    fn test_fresh_token_is_valid() {
        let mut state = SessionState::new((3500, 3700));
        state.mark_authenticated("token".to_owned());
        assert!(!state.needs_auth());

        let ttl = state.token_ttl().as_secs();
        assert!((3500..=3700).contains(&ttl));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let mut state = SessionState::new((0, 0));
        state.mark_authenticated("token".to_owned());
        assert!(state.needs_auth());
    }

    #[test]
    fn test_invalidate() {
        let mut state = SessionState::new((3500, 3700));
        state.mark_authenticated("token".to_owned());
        state.invalidate();
        assert!(state.needs_auth());
    }

    #[test]
    fn test_grants_recorded_once() {
        let mut state = SessionState::new((1, 1));
        assert!(!state.is_granted(7));
        assert!(state.mark_granted(7));
        assert!(!state.mark_granted(7));
        assert!(state.is_granted(7));
    }
}
