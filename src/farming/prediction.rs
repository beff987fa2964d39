//! Price-prediction mini-game.
//!
//! Each round samples the price twice, guesses the direction of the next
//! move and submits it. Consecutive wins build a combo; playing stops once
//! the combo reaches the configured ceiling or the chances run out.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use super::schedule::random_secs;
use crate::api::models::{BetOutcome, Direction};
use crate::api::{ApiError, GameBackend};

/// Guesses the next price move from two samples.
///
/// Follows the trend; flat prices and `random` mode fall back to a coin flip.
pub fn predict_direction(first: f64, second: f64, random: bool, rng: &mut impl Rng) -> Direction {
    if random || (second - first).abs() < f64::EPSILON {
        return if rng.gen_bool(0.5) {
            Direction::Up
        } else {
            Direction::Down
        };
    }

    if second > first {
        Direction::Up
    } else {
        Direction::Down
    }
}

/// Win streak tracker with an inclusive ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboTracker {
    combo: u32,
    max: u32,
}

impl ComboTracker {
    #[must_use]
    pub const fn new(max: u32, combo: u32) -> Self {
        Self { combo, max }
    }

    /// True once the combo is at or above the ceiling.
    #[must_use]
    pub const fn reached(&self) -> bool {
        self.combo >= self.max
    }

    #[must_use]
    pub const fn combo(&self) -> u32 {
        self.combo
    }

    /// Applies a bet outcome; a loss resets the streak.
    pub fn record(&mut self, outcome: &BetOutcome) {
        self.combo = if outcome.win {
            outcome.combo.max(self.combo.saturating_add(1))
        } else {
            0
        };
    }

    /// Takes the server's combo as authoritative.
    pub fn sync(&mut self, combo: u32) {
        self.combo = combo;
    }
}

/// Why a prediction session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ComboReached,
    OutOfChances,
}

/// Totals of one prediction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionSummary {
    pub rounds: u32,
    pub wins: u32,
    pub combo: u32,
    pub stop: StopReason,
}

/// Plays rounds until the combo ceiling or the chances are exhausted.
pub async fn play<B: GameBackend>(
    backend: &B,
    round: Duration,
    random: bool,
    max_combo: u32,
) -> Result<PredictionSummary, ApiError> {
    let mut state = backend.prediction_state().await?;
    let mut tracker = ComboTracker::new(max_combo, state.combo.unwrap_or(0));
    let mut rounds = 0;
    let mut wins = 0;

    let stop = loop {
        if tracker.reached() {
            info!("Combo {} reached the limit of {}", tracker.combo(), max_combo);
            break StopReason::ComboReached;
        }
        if state.chances == 0 {
            info!("No prediction chances left");
            break StopReason::OutOfChances;
        }

        let first = backend.price().await?.price;
        tokio::time::sleep(round).await;
        let second = backend.price().await?.price;

        let direction = predict_direction(first, second, random, &mut rand::thread_rng());
        debug!("Price {} -> {}, betting {}", first, second, direction);

        let outcome = backend.place_bet(direction).await?;
        rounds += 1;
        if outcome.win {
            wins += 1;
        }
        tracker.record(&outcome);
        info!(
            "Prediction {} | {} | Combo: {} | Chances: {} | Balance: {}",
            direction,
            if outcome.win { "won" } else { "lost" },
            tracker.combo(),
            outcome.chances,
            outcome.balance
        );

        tokio::time::sleep(random_secs(2, 4)).await;

        state = backend.prediction_state().await?;
        // Without a server streak the locally counted one stands
        if let Some(combo) = state.combo {
            tracker.sync(combo);
        }
        if let Some(boost) = &state.boost {
            debug!("Prediction boost {} active", boost);
        }
    };

    Ok(PredictionSummary {
        rounds,
        wins,
        combo: tracker.combo(),
        stop,
    })
}
