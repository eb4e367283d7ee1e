use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;
use crate::validation::require_non_empty;

/// Signed fields of a Telegram login widget callback, in the order the backend
/// expects them. `hash` is the one-time proof and plays the role of the code.
const TELEGRAM_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "username",
    "photo_url",
    "auth_date",
    "hash",
    "lang",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    GitHub,
    WeChat,
    Telegram,
}

/// Whether the callback logs a user in or binds the provider account to the
/// already signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeFlow {
    #[default]
    Login,
    Bind,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::WeChat => "wechat",
            OAuthProvider::Telegram => "telegram",
        }
    }

    /// Exchange endpoint for this provider and flow.
    ///
    /// GitHub shares one endpoint for both flows; the server answers
    /// `message: "bind"` when it bound instead of logging in.
    pub fn endpoint(self, flow: ExchangeFlow) -> &'static str {
        match (self, flow) {
            (OAuthProvider::GitHub, _) => "/api/oauth/github",
            (OAuthProvider::WeChat, ExchangeFlow::Login) => "/api/oauth/wechat",
            (OAuthProvider::WeChat, ExchangeFlow::Bind) => "/api/oauth/wechat/bind",
            (OAuthProvider::Telegram, ExchangeFlow::Login) => "/api/oauth/telegram/login",
            (OAuthProvider::Telegram, ExchangeFlow::Bind) => "/api/oauth/telegram/bind",
        }
    }

    /// Name of the callback parameter carrying the one-time code.
    pub fn code_param(self) -> &'static str {
        match self {
            OAuthProvider::Telegram => "hash",
            _ => "code",
        }
    }

    /// Path plus query string for one exchange request.
    pub fn exchange_path(self, flow: ExchangeFlow, params: &CallbackParams) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        match self {
            OAuthProvider::GitHub => {
                query.append_pair("code", &params.code);
                query.append_pair("state", params.state.as_deref().unwrap_or_default());
            }
            OAuthProvider::WeChat => {
                query.append_pair("code", &params.code);
            }
            OAuthProvider::Telegram => {
                for field in TELEGRAM_FIELDS {
                    let value = if *field == "hash" {
                        Some(params.code.as_str())
                    } else {
                        params.extra(field)
                    };
                    if let Some(value) = value.filter(|v| !v.is_empty()) {
                        query.append_pair(field, value);
                    }
                }
            }
        }
        format!("{}?{}", self.endpoint(flow), query.finish())
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(OAuthProvider::GitHub),
            "wechat" => Ok(OAuthProvider::WeChat),
            "telegram" => Ok(OAuthProvider::Telegram),
            other => Err(AppError::Validation(format!("unknown OAuth provider: {other}"))),
        }
    }
}

/// Parameters received on an authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: Option<String>,
    /// Every other parameter, in the order received.
    pub extra: Vec<(String, String)>,
}

impl CallbackParams {
    pub fn new(code: impl Into<String>, state: Option<String>) -> Result<Self, AppError> {
        let code = code.into();
        require_non_empty("code", &code)?;
        Ok(Self {
            code,
            state: state.filter(|s| !s.is_empty()),
            extra: Vec::new(),
        })
    }

    /// Extract the callback parameters from the full redirect URL.
    ///
    /// Parameters are read from the query string, or from the fragment when the
    /// query carries none (implicit-style redirects).
    pub fn from_redirect_url(provider: OAuthProvider, redirect: &str) -> Result<Self, AppError> {
        let parsed = url::Url::parse(redirect)
            .map_err(|e| AppError::Validation(format!("invalid redirect URL: {e}")))?;

        let raw = match parsed.query().filter(|q| !q.is_empty()) {
            Some(query) => query,
            None => parsed.fragment().unwrap_or_default(),
        };

        let mut code = None;
        let mut state = None;
        let mut extra = Vec::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key == provider.code_param() {
                code = Some(value.into_owned());
            } else if key == "state" {
                state = Some(value.into_owned());
            } else {
                extra.push((key.into_owned(), value.into_owned()));
            }
        }

        let code = code.ok_or_else(|| {
            AppError::Validation(format!(
                "redirect URL has no `{}` parameter",
                provider.code_param()
            ))
        })?;
        let mut params = Self::new(code, state)?;
        params.extra = extra;
        Ok(params)
    }

    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
