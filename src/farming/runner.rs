//! Per-account polling loop.
//!
//! Each cycle follows the same state machine:
//! 1. If the token is missing or older than its drawn TTL, fetch fresh init
//!    data from Telegram, log in (up to three attempts), then check the
//!    daily grant and the task list
//! 2. Fetch the farming info
//! 3. Buy the default boost when none is active and the balance covers it
//! 4. Start an idle farm, or finish an expired one and restart it
//! 5. Play the prediction game when enabled
//! 6. Sleep, never past a running farm's deadline
//!
//! Failures of individual calls are logged, followed by a short sleep, and
//! the loop carries on. Only an invalid Telegram session ends it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::prediction;
use super::schedule::{
    boost_needed, daily_action, farm_action, next_sleep, random_secs, tap_count, DailyAction,
    FarmAction,
};
use super::SessionState;
use crate::api::models::{BalanceResponse, FarmStatus, FarmingInfo, LoginResponse, Task, TaskStatus};
use crate::api::{ApiError, GameBackend};
use crate::config::{FarmSettings, GameProfile, LOGIN_ATTEMPTS};
use crate::telegram::{TelegramError, WebAppAuth};

/// Pause after a failed call.
const ERROR_DELAY: Duration = Duration::from_secs(3);

/// Farming loop for one account.
pub struct Tapper<B, A> {
    backend: B,
    auth: A,
    profile: Arc<GameProfile>,
    settings: Arc<FarmSettings>,
    state: SessionState,
}

impl<B: GameBackend, A: WebAppAuth> Tapper<B, A> {
    #[must_use]
    pub fn new(backend: B, auth: A, profile: Arc<GameProfile>, settings: Arc<FarmSettings>) -> Self {
        let state = SessionState::new(settings.token_ttl_secs);
        Self {
            backend,
            auth,
            profile,
            settings,
            state,
        }
    }

    /// Gets a reference to the session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Gets a reference to the game backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs cycles forever; returns only when the session is unusable.
    pub async fn run(mut self) -> Result<(), TelegramError> {
        info!("Farming loop started for {}", self.profile.name);

        loop {
            let pause = self.run_cycle().await?;
            info!("Sleep {} seconds", pause.as_secs());
            sleep(pause).await;
        }
    }

    /// Runs a single cycle and returns how long to sleep before the next one.
    pub async fn run_cycle(&mut self) -> Result<Duration, TelegramError> {
        if self.state.needs_auth() {
            if !self.authenticate().await? {
                return Ok(ERROR_DELAY);
            }
            self.after_login().await;
            if self.state.needs_auth() {
                return Ok(ERROR_DELAY);
            }
        }

        let info = match self.backend.farming_info().await {
            Ok(info) => info,
            Err(e) if e.is_unauthorized() => {
                warn!("Access token rejected, logging in again");
                self.state.invalidate();
                return Ok(ERROR_DELAY);
            }
            Err(e) => {
                error!("Unknown error when getting farming data: {}", e);
                return Ok(random_secs(3, 7));
            }
        };

        if self.settings.buy_boost {
            self.check_boost(&info).await;
        }

        let farm_remaining = self.check_farm(&info).await;

        if self.settings.auto_predict && self.backend.supports_prediction() {
            self.run_predictions().await;
        }

        let (min, max) = self.settings.sleep_secs;
        Ok(next_sleep(random_secs(min, max), farm_remaining))
    }

    /// Fetches init data and logs in. `Ok(false)` means retry next cycle.
    async fn authenticate(&mut self) -> Result<bool, TelegramError> {
        let web_app = match self.auth.fetch_init_data().await {
            Ok(data) => data,
            Err(e) if e.is_invalid_session() => return Err(e),
            Err(e) => {
                error!("Unknown error during Authorization: {}", e);
                sleep(ERROR_DELAY).await;
                return Ok(false);
            }
        };

        if let Some(user) = &web_app.user {
            self.state.user_id = Some(user.id);
            self.state.user_name = Some(user.display_name());
        }

        let Some(login) = self.login(web_app.for_login(self.profile.init_data)).await else {
            return Ok(false);
        };

        self.backend.set_token(login.token.clone());
        self.state.mark_authenticated(login.token);
        debug!("Token valid for {} seconds", self.state.token_ttl().as_secs());

        if let Err(e) = self.backend.ping_version().await {
            warn!("Failed to fetch web app version: {}", e);
        }

        info!(
            "Logged in to {} as {}",
            self.profile.name,
            self.state.user_name.as_deref().unwrap_or("unknown user")
        );
        Ok(true)
    }

    async fn login(&self, init_data: &str) -> Option<LoginResponse> {
        for attempt in 1..=LOGIN_ATTEMPTS {
            match self.backend.login(init_data).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    error!("Login attempt {}/{} failed: {}", attempt, LOGIN_ATTEMPTS, e);
                    sleep(ERROR_DELAY).await;
                }
            }
        }
        None
    }

    /// Daily grant and tasks, done once per login.
    async fn after_login(&mut self) {
        match self.backend.farming_info().await {
            Ok(info) => {
                info!("Balance: {}", info.balance);
                self.check_daily(&info).await;
            }
            Err(e) if e.is_unauthorized() => {
                warn!("Access token rejected right after login");
                self.state.invalidate();
                return;
            }
            Err(e) => {
                error!("Unknown error when getting farming data: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }

        if self.settings.auto_task {
            sleep(random_secs(3, 5)).await;
            self.process_tasks().await;
        }
    }

    async fn check_daily(&self, info: &FarmingInfo) {
        match daily_action(info.day_grant_first, info.day_grant_day, info.system_time) {
            DailyAction::Wait { eligible_at } => {
                debug!("Next daily grant at {}", format_unix(eligible_at));
            }
            DailyAction::ResetThenClaim => {
                match self.backend.reset_daily().await {
                    Ok(()) => info!("Reset Daily Reward"),
                    Err(e) => error!("Unknown error when resetting Daily Reward: {}", e),
                }
                sleep(ERROR_DELAY).await;
                self.claim_daily().await;
            }
            DailyAction::Claim => self.claim_daily().await,
        }
    }

    async fn claim_daily(&self) {
        match self.backend.claim_daily().await {
            Ok(claim) => info!(
                "Daily Claimed! | New Balance: {} | Day count: {}",
                claim.balance, claim.day_grant_day
            ),
            Err(e) => {
                error!("Unknown error when Daily Claiming: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }
    }

    fn is_task_eligible(&self, task: &Task) -> bool {
        task.status == TaskStatus::Possible
            && self.profile.accepts_task_type(&task.kind)
            && !self.state.is_granted(task.id)
    }

    async fn process_tasks(&mut self) {
        let tasks = match self.backend.task_list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Unknown error when fetching tasks: {}", e);
                sleep(ERROR_DELAY).await;
                return;
            }
        };

        let eligible: Vec<Task> = tasks
            .into_iter()
            .filter(|task| self.is_task_eligible(task))
            .collect();

        for task in eligible {
            // The list may repeat an id; only the first grant counts
            if self.state.is_granted(task.id) {
                continue;
            }

            match self.complete_task(&task).await {
                Ok(true) => sleep(random_secs(3, 7)).await,
                Ok(false) => {}
                Err(e) => {
                    error!("Unknown error when completing tasks: {}", e);
                    sleep(ERROR_DELAY).await;
                    return;
                }
            }
        }
    }

    /// Completes a task and claims its grant. `Ok(false)` if nothing was granted.
    async fn complete_task(&mut self, task: &Task) -> Result<bool, ApiError> {
        let response = self.backend.complete_task(task.id).await?;
        if response.task.status != TaskStatus::Done {
            warn!("Task {} not completed | Status: {:?}", task.name, response.task.status);
            return Ok(false);
        }

        info!("Task {} - Completed | Try to claim reward", task.name);
        let new_balance = response.task.grant.saturating_add(response.balance);
        self.backend.claim_task_reward(new_balance).await?;
        self.state.mark_granted(task.id);
        info!("Reward received | Balance: {}", new_balance);
        Ok(true)
    }

    async fn check_boost(&self, info: &FarmingInfo) {
        if !boost_needed(&info.info, info.system_time) {
            return;
        }

        let boost = &self.settings.default_boost;
        let Some(cost) = self.settings.default_boost_cost() else {
            warn!("Boost {} has no configured cost", boost);
            return;
        };

        if cost > info.balance {
            warn!(
                "Can't buy boost, not enough points | Balance: {} | Boost costs: {}",
                info.balance, cost
            );
            return;
        }

        sleep(random_secs(3, 8)).await;
        match self.backend.buy_boost(boost).await {
            Ok(purchase) => info!("Bought boost {} | Balance: {}", purchase.id, purchase.balance),
            Err(e) => {
                error!("Unknown error when buying boost: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }
    }

    /// Drives the farm; returns the time left on a running session.
    async fn check_farm(&self, info: &FarmingInfo) -> Option<Duration> {
        match farm_action(&info.session, self.settings.farm_time_secs, info.system_time) {
            FarmAction::Start => {
                self.start_farming().await;
                None
            }
            FarmAction::Finish => {
                if self.finish_farming(info.info.boost.as_deref()).await {
                    sleep(random_secs(3, 5)).await;
                    self.start_farming().await;
                }
                None
            }
            FarmAction::Wait { remaining } => {
                info!(
                    "Farming in progress, {:.1} min before end",
                    remaining.as_secs_f64() / 60.0
                );
                Some(remaining)
            }
            FarmAction::Ignore => {
                warn!("Unknown farming status, skipping farm");
                None
            }
        }
    }

    async fn start_farming(&self) {
        match self.backend.start_farming().await {
            Ok(response) if response.status == FarmStatus::InProgress => {
                info!("Start farming");
                if self.settings.claim_moon {
                    self.claim_moon().await;
                }
            }
            Ok(response) => warn!("Can't start farming | Status: {:?}", response.status),
            Err(e) => {
                error!("Unknown error when Start Farming: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }
    }

    async fn try_claim_moon(&self) -> Result<BalanceResponse, ApiError> {
        let balance = self.backend.farming_info().await?.balance;
        sleep(random_secs(10, 30)).await;
        self.backend
            .moon_claim(balance.saturating_add(self.settings.moon_bonus))
            .await
    }

    async fn claim_moon(&self) {
        match self.try_claim_moon().await {
            Ok(claim) => info!("Moon bonus claimed | Balance: {}", claim.balance),
            Err(e) => {
                error!("Unknown error when Moon Claiming: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }
    }

    async fn finish_farming(&self, boost: Option<&str>) -> bool {
        let taps = tap_count(&mut rand::thread_rng(), self.settings.taps_range(), boost);

        match self.backend.finish_farming(taps).await {
            Ok(response) => {
                info!(
                    "Finished farming | Got {} points | New balance: {}",
                    response.session.amount + response.session.taps,
                    response.balance
                );
                true
            }
            Err(e) => {
                error!("Unknown error when Stop Farming: {}", e);
                sleep(ERROR_DELAY).await;
                false
            }
        }
    }

    async fn run_predictions(&self) {
        let round = self
            .profile
            .prediction
            .as_ref()
            .map_or(Duration::from_secs(5), |p| Duration::from_secs(p.round_secs));

        match prediction::play(
            &self.backend,
            round,
            self.settings.predict_random,
            self.settings.max_combo,
        )
        .await
        {
            Ok(summary) => info!(
                "Predictions done | Rounds: {} | Wins: {} | Combo: {} | {}",
                summary.rounds,
                summary.wins,
                summary.combo,
                match summary.stop {
                    prediction::StopReason::ComboReached => "combo limit reached",
                    prediction::StopReason::OutOfChances => "no chances left",
                }
            ),
            Err(e) => {
                error!("Unknown error when predicting: {}", e);
                sleep(ERROR_DELAY).await;
            }
        }
    }
}

impl<B, A> std::fmt::Debug for Tapper<B, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tapper")
            .field("profile", &self.profile.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Runs a tapper until its session becomes invalid.
pub async fn run_tapper<B: GameBackend, A: WebAppAuth>(tapper: Tapper<B, A>) {
    if let Err(e) = tapper.run().await {
        error!("Invalid Session: {}", e);
    }
}

/// Formats unix seconds for logs.
fn format_unix(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0).map_or_else(
        || timestamp.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
