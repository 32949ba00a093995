//! Relay HTTP client for push and pull.

use crate::error::{Result, SyncError};
use crate::types::{EventEnvelope, PullRequest, PullResponse, PushResponse};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Client for the sync relay's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    /// Create a new relay client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the relay (e.g. "https://sync.taskdeck.app")
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SyncError::invalid_request("Relay base URL is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: trimmed.to_string(),
        })
    }

    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[sync] relay response status: {}", status);
            return;
        }
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[sync] relay error ({}): {}", status, preview);
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        // 200 is the only success code.
        if status != reqwest::StatusCode::OK {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(SyncError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(SyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("[sync] failed to parse relay response: {} (body: {})", e, body);
            SyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Push local pending events.
    ///
    /// POST /sync/push
    pub async fn push(&self, token: &str, envelope: &EventEnvelope) -> Result<PushResponse> {
        let url = format!("{}/sync/push", self.base_url);
        debug!("[sync] pushing {} events", envelope.events.len());
        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(envelope)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Pull remote events after a checkpoint.
    ///
    /// POST /sync/pull
    pub async fn pull(&self, token: &str, request: &PullRequest) -> Result<PullResponse> {
        let url = format!("{}/sync/pull", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Derive the persistent socket URL: same host, ws(s) scheme, `/ws` path,
    /// token in the query string.
    pub fn websocket_url(&self, token: &str) -> Result<String> {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(SyncError::invalid_request(format!(
                "Relay base URL must be http(s): {}",
                self.base_url
            )));
        };
        Ok(format!("{}/ws?token={}", ws_base, urlencoding::encode(token)))
    }
}
