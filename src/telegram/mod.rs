//! Telegram client wrapper module.
//!
//! Provides account login, bot resolution and web app authentication,
//! which yields the init data the game backends accept as credentials.

mod client;
mod web_app;

pub use client::{
    AccountIdentity, BotPeer, PwdToken as PasswordToken, TelegramBot, TelegramError,
    Token as LoginToken,
};
pub use web_app::{
    parse_web_app_url, BotGateway, WebAppAuth, WebAppAuthenticator, WebAppData,
    WebAppUser,
};
