//! Farm User Bot Library
//!
//! A Telegram userbot that automates farming in web-app mini-games.
//!
//! This crate provides the core functionality for:
//! - Loading farm settings and per-game endpoint profiles
//! - Opening a game bot's web app via `MTProto` to obtain login init data
//! - Talking to the game's REST backend
//! - Running the per-account claim/task/boost/farm polling loop

pub mod api;
pub mod config;
pub mod farming;
pub mod telegram;
