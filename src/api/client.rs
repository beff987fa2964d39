//! HTTP client for a game backend described by a [`GameProfile`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, ORIGIN, REFERER,
    USER_AGENT,
};
use reqwest::{Client, Proxy, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::backend::GameBackend;
use super::models::{
    BalanceResponse, BetOutcome, BoostPurchase, DailyClaimResponse, Direction, FarmingInfo,
    FinishFarmingResponse, LoginResponse, PredictionState, PriceTick, StartFarmingResponse, Task,
    TaskCompleteResponse,
};
use crate::config::{GameProfile, PredictionEndpoints};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const WEBVIEW_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7 Build/TQ3A.230805.001; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/126.0.6478.71 Mobile Safari/537.36";

/// Errors returned by the game API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}) at {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Game does not support {0}")]
    Unsupported(&'static str),
}

impl ApiError {
    /// True when the server rejected the access token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// REST client bound to one account and one game profile.
#[derive(Debug)]
pub struct GameApi {
    http: Client,
    profile: Arc<GameProfile>,
    token: Option<String>,
}

impl GameApi {
    /// Builds the HTTP client with the profile's fixed headers.
    pub fn new(profile: Arc<GameProfile>, proxy_url: Option<&str>) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .default_headers(default_headers(&profile)?)
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT);

        if let Some(proxy_url) = proxy_url {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            http: builder.build()?,
            profile,
            token: None,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.profile.endpoint_url(path)?)
    }

    fn prediction(&self) -> Result<&PredictionEndpoints, ApiError> {
        self.profile
            .prediction
            .as_ref()
            .ok_or(ApiError::Unsupported("price prediction"))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, token.as_str()),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let body = self.send(path, self.http.get(url)).await?;
        decode(path, &body)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let body = self.post_raw(path, payload).await?;
        decode(path, &body)
    }

    async fn post_raw(
        &self,
        path: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.url(path)?;
        let mut request = self.http.post(url);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        self.send(path, request).await
    }

    /// Sends the request and returns the body of a successful response.
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<String, ApiError> {
        let start_time = Instant::now();
        let response = self.authorized(request).send().await?;
        debug!("[API] {} -> {} in {:.2?}", endpoint, response.status(), start_time.elapsed());

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_owned(),
                status,
                body,
            });
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_owned(),
        source,
    })
}

fn default_headers(profile: &GameProfile) -> Result<HeaderMap, ApiError> {
    let header_value =
        |value: &str| HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(value.to_owned()));

    let origin = profile.origin.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ORIGIN, header_value(origin)?);
    headers.insert(REFERER, header_value(&format!("{origin}/"))?);
    headers.insert(USER_AGENT, HeaderValue::from_static(WEBVIEW_USER_AGENT));
    headers.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static("empty"));
    headers.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static("cors"));
    headers.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static("same-site"));
    Ok(headers)
}

impl GameBackend for GameApi {
    fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    async fn login(&self, init_data: &str) -> Result<LoginResponse, ApiError> {
        let mut payload = serde_json::Map::new();
        payload.insert(self.profile.login_field.clone(), json!(init_data));
        self.post(&self.profile.endpoints.login, Some(payload.into())).await
    }

    async fn ping_version(&self) -> Result<(), ApiError> {
        let Some(version_url) = &self.profile.version_url else {
            return Ok(());
        };
        self.send(version_url, self.http.get(version_url.as_str())).await?;
        Ok(())
    }

    async fn farming_info(&self) -> Result<FarmingInfo, ApiError> {
        self.get(&self.profile.endpoints.farming_info).await
    }

    async fn claim_daily(&self) -> Result<DailyClaimResponse, ApiError> {
        self.post(&self.profile.endpoints.daily_claim, None).await
    }

    async fn reset_daily(&self) -> Result<(), ApiError> {
        self.post_raw(&self.profile.endpoints.daily_reset, None).await?;
        Ok(())
    }

    async fn task_list(&self) -> Result<Vec<Task>, ApiError> {
        self.get(&self.profile.endpoints.task_list).await
    }

    async fn complete_task(&self, id: i64) -> Result<TaskCompleteResponse, ApiError> {
        self.post(&self.profile.endpoints.task_complete, Some(json!({ "id": id })))
            .await
    }

    async fn claim_task_reward(&self, balance: i64) -> Result<(), ApiError> {
        self.post_raw(&self.profile.endpoints.task_claim, Some(json!({ "balance": balance })))
            .await?;
        Ok(())
    }

    async fn buy_boost(&self, id: &str) -> Result<BoostPurchase, ApiError> {
        self.post(&self.profile.endpoints.buy_boost, Some(json!({ "id": id })))
            .await
    }

    async fn start_farming(&self) -> Result<StartFarmingResponse, ApiError> {
        self.post(
            &self.profile.endpoints.farming_start,
            Some(json!({ "status": "inProgress" })),
        )
        .await
    }

    async fn finish_farming(&self, taps: u64) -> Result<FinishFarmingResponse, ApiError> {
        self.post(&self.profile.endpoints.farming_finish, Some(json!({ "tapCount": taps })))
            .await
    }

    async fn moon_claim(&self, balance: i64) -> Result<BalanceResponse, ApiError> {
        self.post(&self.profile.endpoints.moon_claim, Some(json!({ "balance": balance })))
            .await
    }

    fn supports_prediction(&self) -> bool {
        self.profile.prediction.is_some()
    }

    async fn prediction_state(&self) -> Result<PredictionState, ApiError> {
        let path = &self.prediction()?.state;
        self.get(path).await
    }

    async fn price(&self) -> Result<PriceTick, ApiError> {
        let path = &self.prediction()?.price;
        self.get(path).await
    }

    async fn place_bet(&self, direction: Direction) -> Result<BetOutcome, ApiError> {
        let path = &self.prediction()?.bet;
        self.post(path, Some(json!({ "direction": direction }))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers_follow_profile() {
        let headers = default_headers(&GameProfile::mmbump()).unwrap();
        assert_eq!(headers[ORIGIN], "https://mmbump.pro");
        assert_eq!(headers[REFERER], "https://mmbump.pro/");
    }

    #[test]
    fn test_invalid_origin_header() {
        let mut profile = GameProfile::mmbump();
        profile.origin = "https://bad\norigin".to_owned();
        assert!(matches!(default_headers(&profile), Err(ApiError::InvalidHeader(_))));
    }

    #[test]
    fn test_decode_reports_endpoint() {
        let err = decode::<LoginResponse>("login", "{}").unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref endpoint, .. } if endpoint == "login"));
    }

    #[test]
    fn test_unauthorized_status() {
        let status = |status| ApiError::Status {
            endpoint: "farming".to_owned(),
            status,
            body: String::new(),
        };
        assert!(status(StatusCode::UNAUTHORIZED).is_unauthorized());
        assert!(!status(StatusCode::INTERNAL_SERVER_ERROR).is_unauthorized());
        assert!(!ApiError::Unsupported("prediction").is_unauthorized());
    }

    #[test]
    fn test_prediction_unsupported_without_table() {
        let api = GameApi::new(Arc::new(GameProfile::mmbump()), None).unwrap();
        assert!(!api.supports_prediction());
        assert!(matches!(api.prediction(), Err(ApiError::Unsupported(_))));

        let api = GameApi::new(Arc::new(GameProfile::example()), None).unwrap();
        assert!(api.supports_prediction());
    }
}
