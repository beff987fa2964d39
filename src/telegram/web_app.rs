//! Web app authentication: turning a bot's web view into login init data.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{BotPeer, TelegramBot, TelegramError};
use crate::config::{FLOOD_WAIT_MARGIN_SECS, GameProfile, InitDataFormat};

/// The Telegram user embedded in the init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl WebAppUser {
    /// Username if set, first name otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Init data extracted from a web view URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAppData {
    /// `tgWebAppData` exactly as signed.
    pub raw: String,
    /// Same pairs with their values percent-decoded.
    pub decoded: String,
    pub user: Option<WebAppUser>,
}

impl WebAppData {
    /// The string to send to the login endpoint.
    #[must_use]
    pub fn for_login(&self, format: InitDataFormat) -> &str {
        match format {
            InitDataFormat::Decoded => &self.decoded,
            InitDataFormat::Raw => &self.raw,
        }
    }
}

/// Parses the `tgWebAppData` out of a web view URL.
///
/// Telegram places it in the fragment; the query is checked as a fallback.
pub fn parse_web_app_url(url: &str) -> Result<WebAppData, TelegramError> {
    let parsed = Url::parse(url).map_err(|e| TelegramError::WebApp(e.to_string()))?;

    let raw = parsed
        .fragment()
        .into_iter()
        .chain(parsed.query())
        .flat_map(|part| url::form_urlencoded::parse(part.as_bytes()))
        .find(|(key, _)| key == "tgWebAppData")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| TelegramError::WebApp("tgWebAppData is missing".to_owned()))?;

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    if pairs.is_empty() {
        return Err(TelegramError::WebApp("tgWebAppData is empty".to_owned()));
    }

    let decoded = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let user = pairs
        .iter()
        .find(|(key, _)| key == "user")
        .and_then(|(_, value)| serde_json::from_str(value).ok());

    Ok(WebAppData { raw, decoded, user })
}

/// Source of fresh init data for the game login.
pub trait WebAppAuth: Send + Sync {
    /// Opens the web app and returns its init data.
    ///
    /// Only [`TelegramError::InvalidSession`] is unrecoverable; everything
    /// else may succeed on the next attempt.
    fn fetch_init_data(&self) -> impl Future<Output = Result<WebAppData, TelegramError>> + Send;
}

/// The Telegram calls needed to open a bot's web app.
pub trait BotGateway: Send + Sync {
    fn resolve_bot(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<BotPeer, TelegramError>> + Send;

    fn start_bot(
        &self,
        bot: &BotPeer,
        start_param: &str,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    fn request_web_view(
        &self,
        bot: &BotPeer,
        url: &str,
        platform: &str,
    ) -> impl Future<Output = Result<String, TelegramError>> + Send;
}

impl BotGateway for TelegramBot {
    async fn resolve_bot(&self, username: &str) -> Result<BotPeer, TelegramError> {
        TelegramBot::resolve_bot(self, username).await
    }

    async fn start_bot(&self, bot: &BotPeer, start_param: &str) -> Result<(), TelegramError> {
        TelegramBot::start_bot(self, bot, start_param).await
    }

    async fn request_web_view(
        &self,
        bot: &BotPeer,
        url: &str,
        platform: &str,
    ) -> Result<String, TelegramError> {
        TelegramBot::request_web_view(self, bot, url, platform).await
    }
}

/// [`WebAppAuth`] backed by a logged-in Telegram account.
#[derive(Debug)]
pub struct WebAppAuthenticator<G = TelegramBot> {
    bot: Arc<G>,
    profile: Arc<GameProfile>,
    use_ref: bool,
    referral_sent: AtomicBool,
}

impl<G: BotGateway> WebAppAuthenticator<G> {
    #[must_use]
    pub fn new(bot: Arc<G>, profile: Arc<GameProfile>, use_ref: bool) -> Self {
        Self {
            bot,
            profile,
            use_ref,
            referral_sent: AtomicBool::new(false),
        }
    }
}

impl<G: BotGateway> WebAppAuth for WebAppAuthenticator<G> {
    async fn fetch_init_data(&self) -> Result<WebAppData, TelegramError> {
        let bot_peer = loop {
            match self.bot.resolve_bot(&self.profile.bot_username).await {
                Ok(peer) => break peer,
                Err(TelegramError::FloodWait(seconds)) => {
                    let wait = u64::from(seconds) + FLOOD_WAIT_MARGIN_SECS;
                    warn!("FloodWait {}s while resolving @{}", seconds, self.profile.bot_username);
                    info!("Sleep {}s", wait);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Err(e) => return Err(e),
            }
        };

        if self.use_ref
            && let Some(referral) = &self.profile.referral
            && !self.referral_sent.swap(true, Ordering::Relaxed)
        {
            match self.bot.start_bot(&bot_peer, referral).await {
                Ok(()) => debug!("Referral start sent"),
                Err(e) if e.is_invalid_session() => return Err(e),
                Err(e) => warn!("Failed to send referral start: {}", e),
            }
        }

        let url = self
            .bot
            .request_web_view(&bot_peer, &self.profile.web_app_url, &self.profile.platform)
            .await?;

        parse_web_app_url(&url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    const WEB_VIEW_URL: &str = "https://mmbump.pro/#tgWebAppData=query_id%3DAAH%26user%3D%257B%2522id%2522%253A42%252C%2522first_name%2522%253A%2522Ann%2522%257D%26auth_date%3D1700000000%26hash%3Dabc&tgWebAppVersion=7.0&tgWebAppPlatform=android";

    #[test]
    fn test_parse_web_app_url() {
        let data = parse_web_app_url(WEB_VIEW_URL).unwrap();
        assert_eq!(
            data.raw,
            "query_id=AAH&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%7D&auth_date=1700000000&hash=abc"
        );
        assert_eq!(
            data.decoded,
            r#"query_id=AAH&user={"id":42,"first_name":"Ann"}&auth_date=1700000000&hash=abc"#
        );

        let user = data.user.unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.display_name(), "Ann");
    }

    #[test]
    fn test_for_login_picks_format() {
        let data = parse_web_app_url(WEB_VIEW_URL).unwrap();
        assert!(data.for_login(InitDataFormat::Raw).contains("%7B"));
        assert!(data.for_login(InitDataFormat::Decoded).contains("{\"id\":42"));
    }

    #[test]
    fn test_parse_from_query() {
        let data =
            parse_web_app_url("https://game.example/?tgWebAppData=auth_date%3D1%26hash%3Dff").unwrap();
        assert_eq!(data.decoded, "auth_date=1&hash=ff");
        assert!(data.user.is_none());
    }

    #[test]
    fn test_missing_web_app_data() {
        assert!(matches!(
            parse_web_app_url("https://mmbump.pro/#tgWebAppVersion=7.0"),
            Err(TelegramError::WebApp(_))
        ));
        assert!(matches!(
            parse_web_app_url("not a url"),
            Err(TelegramError::WebApp(_))
        ));
    }

    struct FakeGateway {
        flood_waits: AtomicU32,
        resolves: AtomicU32,
        starts: AtomicU32,
    }

    impl FakeGateway {
        fn new(flood_waits: u32) -> Self {
            Self {
                flood_waits: AtomicU32::new(flood_waits),
                resolves: AtomicU32::new(0),
                starts: AtomicU32::new(0),
            }
        }
    }

    impl BotGateway for FakeGateway {
        async fn resolve_bot(&self, _username: &str) -> Result<BotPeer, TelegramError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            if self
                .flood_waits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TelegramError::FloodWait(10));
            }
            Ok(BotPeer::new(7, 99))
        }

        async fn start_bot(&self, _bot: &BotPeer, start_param: &str) -> Result<(), TelegramError> {
            assert_eq!(start_param, "ref_722070301");
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn request_web_view(
            &self,
            _bot: &BotPeer,
            _url: &str,
            _platform: &str,
        ) -> Result<String, TelegramError> {
            Ok(WEB_VIEW_URL.to_owned())
        }
    }

    fn authenticator(gateway: FakeGateway, use_ref: bool) -> WebAppAuthenticator<FakeGateway> {
        WebAppAuthenticator::new(Arc::new(gateway), Arc::new(GameProfile::mmbump()), use_ref)
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_wait_sleeps_with_margin() {
        let auth = authenticator(FakeGateway::new(1), false);

        let started = tokio::time::Instant::now();
        let data = auth.fetch_init_data().await.unwrap();

        assert_eq!(
            started.elapsed(),
            Duration::from_secs(10 + FLOOD_WAIT_MARGIN_SECS)
        );
        assert_eq!(auth.bot.resolves.load(Ordering::SeqCst), 2);
        assert_eq!(data.user.unwrap().id, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_referral_sent_once() {
        let auth = authenticator(FakeGateway::new(0), true);
        auth.fetch_init_data().await.unwrap();
        auth.fetch_init_data().await.unwrap();
        assert_eq!(auth.bot.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_referral_skipped_when_disabled() {
        let auth = authenticator(FakeGateway::new(0), false);
        auth.fetch_init_data().await.unwrap();
        assert_eq!(auth.bot.starts.load(Ordering::SeqCst), 0);
    }
}
