//! The game operations the polling loop is written against.

use std::future::Future;

use super::models::{
    BalanceResponse, BetOutcome, BoostPurchase, DailyClaimResponse, Direction, FarmingInfo,
    FinishFarmingResponse, LoginResponse, PredictionState, PriceTick, StartFarmingResponse, Task,
    TaskCompleteResponse,
};
use super::ApiError;

/// A farming game backend.
///
/// [`GameApi`](super::GameApi) talks to the real REST API; tests drive the
/// loop with an in-memory implementation.
pub trait GameBackend: Send + Sync {
    /// Sets the token sent with every later request.
    fn set_token(&mut self, token: String);

    fn login(&self, init_data: &str)
    -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;

    /// Fetches the web app's static version file, if the game has one.
    fn ping_version(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn farming_info(&self) -> impl Future<Output = Result<FarmingInfo, ApiError>> + Send;

    fn claim_daily(&self) -> impl Future<Output = Result<DailyClaimResponse, ApiError>> + Send;

    /// Resets a broken daily streak.
    fn reset_daily(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn task_list(&self) -> impl Future<Output = Result<Vec<Task>, ApiError>> + Send;

    fn complete_task(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<TaskCompleteResponse, ApiError>> + Send;

    /// Credits a completed task's grant by reporting the new balance.
    fn claim_task_reward(&self, balance: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn buy_boost(&self, id: &str) -> impl Future<Output = Result<BoostPurchase, ApiError>> + Send;

    fn start_farming(
        &self,
    ) -> impl Future<Output = Result<StartFarmingResponse, ApiError>> + Send;

    fn finish_farming(
        &self,
        taps: u64,
    ) -> impl Future<Output = Result<FinishFarmingResponse, ApiError>> + Send;

    fn moon_claim(&self, balance: i64)
    -> impl Future<Output = Result<BalanceResponse, ApiError>> + Send;

    /// Whether the game has the price-prediction mini-game.
    fn supports_prediction(&self) -> bool;

    fn prediction_state(&self) -> impl Future<Output = Result<PredictionState, ApiError>> + Send;

    fn price(&self) -> impl Future<Output = Result<PriceTick, ApiError>> + Send;

    fn place_bet(
        &self,
        direction: Direction,
    ) -> impl Future<Output = Result<BetOutcome, ApiError>> + Send;
}
