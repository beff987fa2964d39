//! Farm User Bot - Main Entry Point
//!
//! A Telegram userbot that opens a game's web app for every stored account
//! and keeps its farming sessions, daily grants and tasks going.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use farm_user_bot::api::GameApi;
use farm_user_bot::config::{FarmSettings, GameProfile, TelegramConfig};
use farm_user_bot::farming::{run_tapper, Tapper};
use farm_user_bot::telegram::{TelegramBot, TelegramError, WebAppAuthenticator};

/// Telegram userbot for web-app farming games.
#[derive(Parser, Debug)]
#[command(name = "farm_bot")]
#[command(about = "Automate farming sessions in Telegram web-app games")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env", global = true)]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Game profile JSON file. Uses the built-in MMBump profile if omitted.
    #[arg(short, long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the farming loop for every stored session (default).
    Run {
        /// Only run this session.
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Log in a Telegram account and store it as a new session.
    AddSession {
        /// Name of the session file to create.
        name: String,
    },

    /// Write an example game profile and exit.
    GenerateProfile {
        /// Output path.
        #[arg(default_value = "profile.example.json")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    match args.command.unwrap_or(Command::Run { session: None }) {
        Command::Run { session } => run(args.profile.as_deref(), session).await,
        Command::AddSession { name } => add_session(&name).await,
        Command::GenerateProfile { path } => generate_example_profile(&path),
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads and validates the game profile.
fn load_profile(path: Option<&str>) -> Result<GameProfile> {
    let profile = match path {
        Some(path) => GameProfile::load_from_file(path)
            .with_context(|| format!("Failed to load game profile from {path}"))?,
        None => GameProfile::mmbump(),
    };

    profile
        .validate()
        .context("Game profile validation failed")?;

    Ok(profile)
}

/// Runs one farming task per authorized session until Ctrl+C.
async fn run(profile_path: Option<&str>, only_session: Option<String>) -> Result<()> {
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = FarmSettings::from_env_with_defaults();
    settings.validate().context("Invalid farm settings")?;

    let profile = Arc::new(load_profile(profile_path)?);
    let settings = Arc::new(settings);

    let sessions = match only_session {
        Some(name) => vec![name],
        None => tg_config.list_sessions().with_context(|| {
            format!("Failed to read sessions directory {}", tg_config.sessions_dir.display())
        })?,
    };

    if sessions.is_empty() {
        bail!(
            "No sessions found in {}. Add one with `farm_bot add-session <name>`",
            tg_config.sessions_dir.display()
        );
    }

    info!("Loaded profile {} for {} session(s)", profile.name, sessions.len());

    let mut tasks = JoinSet::new();
    let mut bots = Vec::new();

    for name in sessions {
        let proxy = settings.proxy_url.as_deref();
        let bot = match TelegramBot::connect(&tg_config, &name, proxy).await {
            Ok(bot) => Arc::new(bot),
            Err(e) => {
                error!("{} | Failed to connect: {}", name, e);
                continue;
            }
        };

        match bot.is_authorized().await {
            Ok(true) => {}
            Ok(false) => {
                error!("{} | Invalid Session", name);
                bot.disconnect();
                continue;
            }
            Err(e) => {
                error!("{} | Failed to check authorization: {}", name, e);
                bot.disconnect();
                continue;
            }
        }

        let api = GameApi::new(Arc::clone(&profile), settings.proxy_url.as_deref())
            .context("Failed to build the game API client")?;
        let auth = WebAppAuthenticator::new(Arc::clone(&bot), Arc::clone(&profile), settings.use_ref);
        let tapper = Tapper::new(api, auth, Arc::clone(&profile), Arc::clone(&settings));

        let span = info_span!("account", session = %name);
        tasks.spawn(run_tapper(tapper).instrument(span));
        bots.push(bot);
    }

    if tasks.is_empty() {
        bail!("No usable sessions");
    }

    info!("Bot is running {} account(s). Use Ctrl+C to stop.", tasks.len());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        () = async { while tasks.join_next().await.is_some() {} } => {
            warn!("All accounts have stopped");
        }
    }

    // Cleanup
    tasks.abort_all();
    for bot in &bots {
        bot.disconnect();
    }

    Ok(())
}

/// Logs in a new account interactively.
async fn add_session(name: &str) -> Result<()> {
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = FarmSettings::from_env_with_defaults();
    let bot = TelegramBot::connect(&tg_config, name, settings.proxy_url.as_deref())
        .await
        .context("Failed to connect to Telegram")?;

    if bot.is_authorized().await.context("Failed to check authorization")? {
        info!("Session {} is already authorized", name);
    } else {
        authenticate(&bot, &tg_config).await?;
    }

    let me = bot.me().await.context("Failed to fetch account info")?;
    info!("Session {} belongs to {} (id {})", name, me.name, me.id);

    bot.disconnect();
    Ok(())
}

/// Writes an example game profile.
fn generate_example_profile(path: &str) -> Result<()> {
    GameProfile::example().save_to_file(path)?;

    println!("✓ Example profile written to: {path}");
    println!("\nTo use this bot:");
    println!("1. Create a .env file with TG_API_ID and TG_API_HASH");
    println!("2. Add an account: farm_bot add-session <name>");
    println!("3. Run: farm_bot run (or farm_bot --profile {path} run for another game)");

    Ok(())
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}
