//! Game backend REST API.

mod backend;
mod client;
pub mod models;

pub use backend::GameBackend;
pub use client::{ApiError, GameApi};
