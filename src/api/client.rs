use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::oauth::exchange::{CodeExchanger, ExchangeAttempt, ExchangeFailure, ExchangeSuccess};
use crate::oauth::provider::{CallbackParams, ExchangeFlow, OAuthProvider};
use crate::settings::submit::OptionWriter;

use super::types::{ApiResponse, OptionEntry, OptionWriteBody};

// ============================================================================
// Helper
// ============================================================================

fn network_err(e: impl std::fmt::Display) -> AppError {
    AppError::Network(e.to_string())
}

// ============================================================================
// OptionApi
// ============================================================================

/// HTTP client for the admin option endpoints and the OAuth exchange endpoints.
pub struct OptionApi {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl OptionApi {
    /// `base_url` must already be normalized (no trailing slash).
    pub fn new(base_url: String, access_token: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url,
            access_token,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            config.access_token.clone(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    /// Build a request to `path`, carrying the raw access token when one is set.
    fn authed(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.access_token {
            Some(token) => req.header(reqwest::header::AUTHORIZATION, token),
            None => req,
        }
    }

    /// Send a request and decode the `{ success, message, data }` envelope.
    /// Non-2xx statuses become [`AppError::Api`] with the response body.
    async fn send_envelope<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, AppError> {
        let resp = req.send().await.map_err(network_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        resp.json().await.map_err(network_err)
    }

    /// Like [`send_envelope`](Self::send_envelope), also rejecting `success: false`.
    async fn send_ok<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<T>, AppError> {
        self.send_envelope(req).await?.into_result()
    }

    // --------------------------------------------------------------------
    // Options
    // --------------------------------------------------------------------

    /// `GET /api/option/` -- every stored option.
    pub async fn fetch_options(&self) -> Result<Vec<OptionEntry>, AppError> {
        let entries: Option<Vec<OptionEntry>> = self
            .send_ok(self.authed(reqwest::Method::GET, "/api/option/"))
            .await?;
        let entries = entries.unwrap_or_default();
        tracing::debug!(count = entries.len(), "Fetched options");
        Ok(entries)
    }

    /// `PUT /api/option/` -- write one option.
    pub async fn put_option(&self, key: &str, value: &str) -> Result<(), AppError> {
        let req = self
            .authed(reqwest::Method::PUT, "/api/option/")
            .json(&OptionWriteBody { key, value });
        self.send_ok::<serde_json::Value>(req).await?;
        Ok(())
    }

    /// `POST /api/option/rest_model_ratio` -- restore the built-in model ratio table.
    pub async fn reset_model_ratio(&self) -> Result<(), AppError> {
        self.send_ok::<serde_json::Value>(
            self.authed(reqwest::Method::POST, "/api/option/rest_model_ratio"),
        )
        .await?;
        tracing::info!("Model ratio reset to defaults");
        Ok(())
    }

    // --------------------------------------------------------------------
    // OAuth
    // --------------------------------------------------------------------

    /// `GET /api/oauth/{provider}?...` -- one raw exchange call. The envelope is
    /// returned as-is so the caller can classify `success: false`.
    pub async fn exchange_code(
        &self,
        provider: OAuthProvider,
        flow: ExchangeFlow,
        params: &CallbackParams,
    ) -> Result<ApiResponse<serde_json::Value>, AppError> {
        let path = provider.exchange_path(flow, params);
        self.send_envelope(self.authed(reqwest::Method::GET, &path)).await
    }

    /// Bind this client to one callback so it can drive a retry controller.
    pub fn exchanger(
        &self,
        provider: OAuthProvider,
        flow: ExchangeFlow,
        params: CallbackParams,
    ) -> ProviderExchanger<'_> {
        ProviderExchanger {
            api: self,
            provider,
            flow,
            params,
        }
    }
}

#[async_trait]
impl OptionWriter for OptionApi {
    async fn write_option(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.put_option(key, value).await
    }
}

// ============================================================================
// ProviderExchanger
// ============================================================================

/// [`CodeExchanger`] backed by the provider's exchange endpoint.
pub struct ProviderExchanger<'a> {
    api: &'a OptionApi,
    provider: OAuthProvider,
    flow: ExchangeFlow,
    params: CallbackParams,
}

impl ProviderExchanger<'_> {
    pub fn params(&self) -> &CallbackParams {
        &self.params
    }

    pub fn flow(&self) -> ExchangeFlow {
        self.flow
    }
}

#[async_trait]
impl<'a> CodeExchanger for ProviderExchanger<'a> {
    async fn exchange(&self, attempt: &ExchangeAttempt) -> Result<ExchangeSuccess, ExchangeFailure> {
        tracing::debug!(
            provider = %self.provider,
            attempt = attempt.attempt_count,
            max_attempts = attempt.max_attempts,
            "Exchanging authorization code",
        );
        let resp = self
            .api
            .exchange_code(self.provider, self.flow, &self.params)
            .await
            .map_err(|e| match e {
                AppError::Api { status, message } => ExchangeFailure::Http {
                    status,
                    body: message,
                },
                other => ExchangeFailure::Transport {
                    reason: other.to_string(),
                },
            })?;

        if !resp.success {
            return Err(ExchangeFailure::Rejected {
                message: resp.message,
            });
        }
        if resp.message == "bind" {
            return Ok(ExchangeSuccess::Bound);
        }
        Ok(ExchangeSuccess::LoggedIn {
            user: resp.data.unwrap_or(serde_json::Value::Null),
        })
    }
}
