use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::api::client::OptionApi;
use crate::config::{self, SyncConfig};
use crate::error::AppError;
use crate::logging::LogFormat;
use crate::oauth::exchange::RetryExchangeController;
use crate::oauth::provider::{CallbackParams, ExchangeFlow, OAuthProvider};
use crate::settings::features::FeatureSnapshot;
use crate::settings::keys;
use crate::settings::submit::BatchSubmitter;
use crate::settings::SettingsPanel;
use crate::validation::require_non_empty;

#[derive(Debug, Parser)]
#[command(name = "option-sync", version, about = "Inspect and sync backend option panels")]
pub struct Cli {
    /// Directory for crash reports. No crash hook is installed when unset.
    #[arg(long, global = true, env = "OPTION_SYNC_CRASH_DIR")]
    pub crash_dir: Option<PathBuf>,

    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_format(&self) -> LogFormat {
        if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the built-in panels and their declared keys.
    Panels,
    /// Show the current values of a panel.
    Show { panel: String },
    /// Stage KEY=VALUE edits on a panel and save the ones that changed.
    Set {
        panel: String,
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
    /// Restore the built-in model ratio table.
    ResetModelRatio,
    /// Exchange an authorization callback code, retrying transient failures.
    Exchange {
        provider: OAuthProvider,
        #[arg(long, required_unless_present = "redirect_url", conflicts_with = "redirect_url")]
        code: Option<String>,
        #[arg(long, requires = "code")]
        state: Option<String>,
        /// Full redirect URL received by the callback handler.
        #[arg(long)]
        redirect_url: Option<String>,
        /// Bind the provider account to the signed-in user instead of logging in.
        #[arg(long)]
        bind: bool,
    },
    /// Manage the access token kept in the OS keyring.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    Store {
        #[arg(env = "OPTION_SYNC_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },
    Clear,
}

/// JSON printed on stdout plus whether the command achieved what was asked.
#[derive(Debug)]
pub struct CommandOutput {
    pub body: Value,
    pub ok: bool,
}

impl CommandOutput {
    fn ok(body: Value) -> Self {
        Self { body, ok: true }
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn panel_schema(name: &str) -> Result<crate::settings::schema::PanelSchema, AppError> {
    keys::panel(name).ok_or_else(|| {
        AppError::NotFound(format!(
            "unknown panel {name:?}; expected one of {}",
            keys::PANEL_NAMES.join(", ")
        ))
    })
}

async fn load_panel(api: &OptionApi, name: &str) -> Result<SettingsPanel, AppError> {
    let schema = panel_schema(name)?;
    let entries = api.fetch_options().await?;
    let features = FeatureSnapshot::from_entries(&entries);
    let mut panel = SettingsPanel::new(schema, &features);
    panel.load(&entries);
    Ok(panel)
}

fn render(panel: &SettingsPanel) -> Value {
    let values: serde_json::Map<String, Value> = panel
        .rendered()
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect();
    json!({ "panel": panel.name(), "values": values })
}

pub async fn execute(command: Command) -> Result<CommandOutput, AppError> {
    match command {
        Command::Panels => {
            let panels: Vec<Value> = keys::PANEL_NAMES
                .iter()
                .filter_map(|name| keys::panel(name))
                .map(|schema| json!({ "panel": schema.name(), "settings": schema.specs() }))
                .collect();
            Ok(CommandOutput::ok(Value::Array(panels)))
        }
        Command::Show { panel } => {
            let config = SyncConfig::resolve()?;
            let api = OptionApi::from_config(&config);
            let panel = load_panel(&api, &panel).await?;
            Ok(CommandOutput::ok(render(&panel)))
        }
        Command::Set { panel, assignments } => {
            let config = SyncConfig::resolve()?;
            let api = OptionApi::from_config(&config);
            let mut panel = load_panel(&api, &panel).await?;
            for (key, value) in &assignments {
                panel.set_draft_input(key, value)?;
            }
            let outcome = panel.save(&BatchSubmitter::new(&api)).await;
            Ok(CommandOutput {
                ok: outcome.is_success(),
                body: serde_json::to_value(&outcome)?,
            })
        }
        Command::ResetModelRatio => {
            let config = SyncConfig::resolve()?;
            let api = OptionApi::from_config(&config);
            api.reset_model_ratio().await?;
            let panel = load_panel(&api, "magnification").await?;
            Ok(CommandOutput::ok(render(&panel)))
        }
        Command::Exchange {
            provider,
            code,
            state,
            redirect_url,
            bind,
        } => {
            let params = match (code, redirect_url) {
                (_, Some(url)) => CallbackParams::from_redirect_url(provider, &url)?,
                (Some(code), None) => CallbackParams::new(code, state)?,
                (None, None) => {
                    return Err(AppError::Validation(
                        "either --code or --redirect-url is required".into(),
                    ))
                }
            };
            let flow = if bind { ExchangeFlow::Bind } else { ExchangeFlow::Login };

            let config = SyncConfig::resolve()?;
            let api = OptionApi::from_config(&config);
            let (code, state) = (params.code.clone(), params.state.clone());
            let mut controller = RetryExchangeController::new(
                api.exchanger(provider, flow, params),
                flow,
                code,
                state,
                config.retry_policy(),
            );

            let token = controller.cancel_token();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; cancelling code exchange");
                    token.cancel();
                }
            });
            let outcome = controller.run().await;
            interrupt.abort();

            Ok(CommandOutput {
                ok: matches!(outcome.state, crate::oauth::ExchangeState::Succeeded { .. }),
                body: serde_json::to_value(&outcome)?,
            })
        }
        Command::Token { action } => match action {
            TokenAction::Store { token } => {
                require_non_empty("token", &token)?;
                config::store_access_token(token.trim())?;
                Ok(CommandOutput::ok(json!({ "stored": true })))
            }
            TokenAction::Clear => {
                let removed = config::clear_access_token()?;
                Ok(CommandOutput::ok(json!({ "cleared": removed })))
            }
        },
    }
}
