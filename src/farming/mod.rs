//! Farming engine.
//!
//! Runs the per-account polling loop against any game described by a
//! profile: daily grants, tasks, boosts, timed farming sessions and the
//! optional price-prediction game.

pub mod prediction;
mod runner;
pub mod schedule;
mod state;

pub use runner::{run_tapper, Tapper};
pub use state::SessionState;
