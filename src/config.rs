//! Runtime configuration.
//!
//! Each value is looked up in the process environment first, then in `.env`
//! files (`.env`, `../.env`), then, for the access token only, in the OS
//! keyring. Anything still missing falls back to a built-in default.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use keyring::Entry;

use crate::error::AppError;
use crate::oauth::exchange::RetryPolicy;
use crate::validation::{require_at_least, require_http_url};

pub const ENV_BASE_URL: &str = "OPTION_SYNC_BASE_URL";
pub const ENV_ACCESS_TOKEN: &str = "OPTION_SYNC_ACCESS_TOKEN";
pub const ENV_MAX_ATTEMPTS: &str = "OPTION_SYNC_MAX_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "OPTION_SYNC_RETRY_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "OPTION_SYNC_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DOTENV_CANDIDATES: &[&str] = &[".env", "../.env"];

const SERVICE: &str = "option-sync";
const KEY_TOKEN: &str = "access-token";

#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Normalized: no trailing slash.
    pub base_url: String,
    pub access_token: Option<String>,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Resolve from environment, `.env` files and the keyring.
    pub fn resolve() -> Result<Self, AppError> {
        let config = Self::from_lookup(
            |key| env_var_nonempty(key).or_else(|| dotenv_var_nonempty(key)),
            load_access_token,
        )?;
        tracing::debug!(config = ?config, "Configuration resolved");
        Ok(config)
    }

    /// Build from an arbitrary key lookup. `stored_token` is only consulted
    /// when the lookup has no access token.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        stored_token: impl FnOnce() -> Option<String>,
    ) -> Result<Self, AppError> {
        let base_url = lookup(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = require_http_url(ENV_BASE_URL, &base_url).map_err(into_config_err)?;

        let access_token = lookup(ENV_ACCESS_TOKEN).or_else(stored_token);

        let max_attempts = parse_number(ENV_MAX_ATTEMPTS, lookup(ENV_MAX_ATTEMPTS), DEFAULT_MAX_ATTEMPTS)?;
        require_at_least(ENV_MAX_ATTEMPTS, u64::from(max_attempts), 1).map_err(into_config_err)?;

        let retry_delay_ms =
            parse_number(ENV_RETRY_DELAY_MS, lookup(ENV_RETRY_DELAY_MS), DEFAULT_RETRY_DELAY_MS)?;
        let timeout_secs = parse_number(ENV_TIMEOUT_SECS, lookup(ENV_TIMEOUT_SECS), DEFAULT_TIMEOUT_SECS)?;
        require_at_least(ENV_TIMEOUT_SECS, timeout_secs, 1).map_err(into_config_err)?;

        Ok(Self {
            base_url,
            access_token,
            max_attempts,
            retry_base_delay: Duration::from_millis(retry_delay_ms),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_base_delay)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}={raw:?} is not a valid number: {e}"))),
    }
}

fn into_config_err(e: AppError) -> AppError {
    match e {
        AppError::Validation(msg) => AppError::Config(msg),
        other => other,
    }
}

/// First non-empty value of `key` in the process environment.
pub fn env_var_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// First non-empty value of `key` in the `.env` candidates, without touching
/// the process environment.
pub fn dotenv_var_nonempty(key: &str) -> Option<String> {
    for path in DOTENV_CANDIDATES {
        let Ok(iter) = dotenvy::from_path_iter(path) else {
            continue;
        };
        for (name, value) in iter.flatten() {
            if name == key && !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

// ============================================================================
// Keyring
// ============================================================================

/// Store the admin access token in the OS keyring.
pub fn store_access_token(token: &str) -> Result<(), AppError> {
    store_token_in(SERVICE, token)?;
    tracing::info!("Access token stored in keyring");
    Ok(())
}

/// Load the access token from the OS keyring. Returns None if not stored.
pub fn load_access_token() -> Option<String> {
    match load_token_from(SERVICE) {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read access token from keyring");
            None
        }
    }
}

/// Remove the access token from the OS keyring. Returns false when no token
/// was stored.
pub fn clear_access_token() -> Result<bool, AppError> {
    let removed = clear_token_in(SERVICE)?;
    if removed {
        tracing::info!("Access token cleared from keyring");
    } else {
        tracing::debug!("No access token in keyring to clear");
    }
    Ok(removed)
}

fn token_entry(service: &str) -> Result<Entry, AppError> {
    Entry::new(service, KEY_TOKEN).map_err(|e| AppError::Config(format!("keyring entry error: {e}")))
}

fn store_token_in(service: &str, token: &str) -> Result<(), AppError> {
    token_entry(service)?
        .set_password(token)
        .map_err(|e| AppError::Config(format!("Failed to store access token: {e}")))
}

fn load_token_from(service: &str) -> Result<Option<String>, AppError> {
    match token_entry(service)?.get_password() {
        Ok(token) if token.is_empty() => Ok(None),
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(AppError::Config(format!("Failed to read access token: {e}"))),
    }
}

fn clear_token_in(service: &str) -> Result<bool, AppError> {
    match token_entry(service)?.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(AppError::Config(format!("Failed to clear access token: {e}"))),
    }
}
