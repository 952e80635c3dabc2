//! Connection settings for [`DerivApiService`](crate::service::DerivApiService).

use std::fmt;

use crate::network::{endpoint_url, DEFAULT_WS_URL};
use crate::websocket::{WebSocketConfig, WebSocketError, WsResult};

pub const ENV_APP_ID: &str = "DERIV_APP_ID";
pub const ENV_ENDPOINT: &str = "DERIV_ENDPOINT";
pub const ENV_LANGUAGE: &str = "DERIV_LANGUAGE";
pub const ENV_API_TOKEN: &str = "DERIV_API_TOKEN";

/// Settings for one Deriv connection
#[derive(Clone)]
pub struct DerivConfig {
    /// Registered application id
    pub app_id: String,
    /// WebSocket endpoint; [`DEFAULT_WS_URL`] when unset
    pub endpoint: Option<String>,
    /// Response language, e.g. `EN`
    pub language: Option<String>,
    /// Token used to authorize the connection right after connecting
    pub api_token: Option<String>,
    pub websocket: WebSocketConfig,
}

impl DerivConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            endpoint: None,
            language: None,
            api_token: None,
            websocket: WebSocketConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }

    /// Load from `DERIV_APP_ID` (required), `DERIV_ENDPOINT`, `DERIV_LANGUAGE`
    /// and `DERIV_API_TOKEN`.
    pub fn from_env() -> WsResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> WsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let app_id = read(ENV_APP_ID)
            .ok_or_else(|| WebSocketError::InvalidConfig(format!("{} is not set", ENV_APP_ID)))?;

        let config = Self {
            app_id: app_id.trim().to_string(),
            endpoint: read(ENV_ENDPOINT),
            language: read(ENV_LANGUAGE),
            api_token: read(ENV_API_TOKEN),
            websocket: WebSocketConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WsResult<()> {
        if self.app_id.is_empty() || !self.app_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(WebSocketError::InvalidConfig(format!(
                "app_id must be numeric, got {:?}",
                self.app_id
            )));
        }

        let endpoint = self.endpoint_or_default();
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(WebSocketError::InvalidUrl(endpoint.to_string()));
        }

        if self.websocket.request_timeout_secs == 0 {
            return Err(WebSocketError::InvalidConfig(
                "request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_WS_URL)
    }

    /// Full connection URL including `app_id`
    pub fn url(&self) -> String {
        endpoint_url(
            self.endpoint_or_default(),
            &self.app_id,
            self.language.as_deref(),
        )
    }
}

impl fmt::Debug for DerivConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivConfig")
            .field("app_id", &self.app_id)
            .field("endpoint", &self.endpoint)
            .field("language", &self.language)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("websocket", &self.websocket)
            .finish()
    }
}
