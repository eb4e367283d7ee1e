//! Bounded-retry state machine for one-time authorization code exchange.
//!
//! ```text
//! Idle ──► Exchanging ──► Succeeded
//!              │   ├────► NonRetryableFailure
//!              │   └────► Exhausted            (attempt_count >= max_attempts)
//!              ▼
//!         WaitingRetry ──(attempt_count * base_delay)──► Exchanging
//! ```
//!
//! Any non-terminal state moves to `Cancelled` once the cancellation token
//! fires. Attempts are strictly sequential and `attempt_count` is incremented
//! before each call, so one `(code, state)` pair is submitted at most
//! `max_attempts` times.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

use super::provider::ExchangeFlow;

// ============================================================================
// Data types
// ============================================================================

/// The code being exchanged and how many calls have been spent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeAttempt {
    pub code: String,
    pub state: Option<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
}

/// What the server handed back on a successful exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExchangeSuccess {
    /// Session established; `user` is the session payload returned by the server.
    LoggedIn { user: serde_json::Value },
    /// Provider account bound to the current user.
    Bound,
}

/// Why a single exchange call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExchangeFailure {
    /// No usable HTTP response (connect, timeout, malformed body).
    Transport { reason: String },
    /// Non-2xx status.
    Http { status: u16, body: String },
    /// The server answered `success: false`.
    Rejected { message: String },
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeFailure::Transport { reason } => write!(f, "transport failure: {reason}"),
            ExchangeFailure::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            ExchangeFailure::Rejected { message } => write!(f, "rejected: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExchangeState {
    Idle,
    Exchanging { attempt: u32 },
    WaitingRetry { attempt: u32, delay_ms: u64 },
    Succeeded { success: ExchangeSuccess },
    Exhausted { attempts: u32, last_failure: ExchangeFailure },
    NonRetryableFailure { failure: ExchangeFailure },
    Cancelled,
}

impl ExchangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeState::Succeeded { .. }
                | ExchangeState::Exhausted { .. }
                | ExchangeState::NonRetryableFailure { .. }
                | ExchangeState::Cancelled
        )
    }

    fn label(&self) -> &'static str {
        match self {
            ExchangeState::Idle => "idle",
            ExchangeState::Exchanging { .. } => "exchanging",
            ExchangeState::WaitingRetry { .. } => "waiting_retry",
            ExchangeState::Succeeded { .. } => "succeeded",
            ExchangeState::Exhausted { .. } => "exhausted",
            ExchangeState::NonRetryableFailure { .. } => "non_retryable_failure",
            ExchangeState::Cancelled => "cancelled",
        }
    }
}

/// Final report of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    pub attempts: u32,
    #[serde(flatten)]
    pub state: ExchangeState,
}

impl ExchangeOutcome {
    /// Collapse a finished run into the success value or an [`AppError::Exchange`].
    pub fn into_result(self) -> Result<ExchangeSuccess, AppError> {
        match self.state {
            ExchangeState::Succeeded { success } => Ok(success),
            ExchangeState::Exhausted { attempts, last_failure } => Err(AppError::Exchange(format!(
                "gave up after {attempts} attempts: {last_failure}"
            ))),
            ExchangeState::NonRetryableFailure { failure } => Err(AppError::Exchange(failure.to_string())),
            ExchangeState::Cancelled => Err(AppError::Exchange("cancelled".into())),
            ExchangeState::Idle | ExchangeState::Exchanging { .. } | ExchangeState::WaitingRetry { .. } => {
                Err(AppError::Internal(format!(
                    "exchange reported in non-terminal state {}",
                    self.state.label()
                )))
            }
        }
    }
}

// ============================================================================
// Seams
// ============================================================================

/// Performs exactly one remote exchange call per invocation.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(&self, attempt: &ExchangeAttempt) -> Result<ExchangeSuccess, ExchangeFailure>;
}

#[async_trait]
impl<E: CodeExchanger + ?Sized> CodeExchanger for Arc<E> {
    async fn exchange(&self, attempt: &ExchangeAttempt) -> Result<ExchangeSuccess, ExchangeFailure> {
        (**self).exchange(attempt).await
    }
}

/// Decides whether a failed call is worth repeating.
pub trait FailureClassifier: Send + Sync {
    fn is_retryable(&self, failure: &ExchangeFailure, flow: ExchangeFlow) -> bool;
}

/// Transport errors, 5xx and 429 retry. Other 4xx do not. A `success: false`
/// answer retries on login but not on bind, where it means the provider
/// account is already taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn is_retryable(&self, failure: &ExchangeFailure, flow: ExchangeFlow) -> bool {
        match failure {
            ExchangeFailure::Transport { .. } => true,
            ExchangeFailure::Http { status, .. } => *status >= 500 || *status == 429,
            ExchangeFailure::Rejected { .. } => flow == ExchangeFlow::Login,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is raised to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Linear backoff: the n-th failure waits `n * base_delay`.
    pub fn delay_after(&self, attempt_count: u32) -> Duration {
        self.base_delay.saturating_mul(attempt_count)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct RetryExchangeController<E, C = DefaultClassifier> {
    exchanger: E,
    classifier: C,
    flow: ExchangeFlow,
    policy: RetryPolicy,
    attempt: ExchangeAttempt,
    state: ExchangeState,
    cancel: CancellationToken,
}

impl<E: CodeExchanger> RetryExchangeController<E, DefaultClassifier> {
    pub fn new(
        exchanger: E,
        flow: ExchangeFlow,
        code: impl Into<String>,
        state: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            exchanger,
            classifier: DefaultClassifier,
            flow,
            policy,
            attempt: ExchangeAttempt {
                code: code.into(),
                state,
                attempt_count: 0,
                max_attempts: policy.max_attempts,
            },
            state: ExchangeState::Idle,
            cancel: CancellationToken::new(),
        }
    }
}

impl<E: CodeExchanger, C: FailureClassifier> RetryExchangeController<E, C> {
    pub fn with_classifier<C2: FailureClassifier>(self, classifier: C2) -> RetryExchangeController<E, C2> {
        RetryExchangeController {
            exchanger: self.exchanger,
            classifier,
            flow: self.flow,
            policy: self.policy,
            attempt: self.attempt,
            state: self.state,
            cancel: self.cancel,
        }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn attempt(&self) -> &ExchangeAttempt {
        &self.attempt
    }

    pub fn exchanger(&self) -> &E {
        &self.exchanger
    }

    /// Handle for cancelling from elsewhere (signal handler, owning view).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Perform one transition out of the current state and return the new one.
    ///
    /// From `Idle` this issues the first call; from `WaitingRetry` it sleeps the
    /// scheduled delay and then issues the next call. Terminal states are left
    /// untouched.
    pub async fn step(&mut self) -> &ExchangeState {
        if self.state.is_terminal() {
            return &self.state;
        }
        if self.cancel.is_cancelled() {
            self.transition(ExchangeState::Cancelled);
            return &self.state;
        }

        if let ExchangeState::WaitingRetry { delay_ms, .. } = self.state {
            let slept = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => false,
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
            };
            if !slept {
                self.transition(ExchangeState::Cancelled);
                return &self.state;
            }
        }

        self.exchange_once().await;
        &self.state
    }

    /// Drive the machine until it reaches a terminal state.
    pub async fn run(&mut self) -> ExchangeOutcome {
        while !self.state.is_terminal() {
            self.step().await;
        }
        ExchangeOutcome {
            attempts: self.attempt.attempt_count,
            state: self.state.clone(),
        }
    }

    async fn exchange_once(&mut self) {
        self.attempt.attempt_count += 1;
        let attempt = self.attempt.attempt_count;
        self.transition(ExchangeState::Exchanging { attempt });

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.exchanger.exchange(&self.attempt) => Some(result),
        };

        let next = match result {
            None => ExchangeState::Cancelled,
            Some(Ok(success)) => ExchangeState::Succeeded { success },
            Some(Err(failure)) => {
                if !self.classifier.is_retryable(&failure, self.flow) {
                    tracing::warn!(attempt, error = %failure, "Code exchange failed; not retrying");
                    ExchangeState::NonRetryableFailure { failure }
                } else if attempt >= self.policy.max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %failure,
                        "Code exchange retries exhausted",
                    );
                    ExchangeState::Exhausted {
                        attempts: attempt,
                        last_failure: failure,
                    }
                } else {
                    let delay = self.policy.delay_after(attempt);
                    tracing::info!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Code exchange failed; retry scheduled",
                    );
                    ExchangeState::WaitingRetry {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    }
                }
            }
        };
        self.transition(next);
    }

    fn transition(&mut self, next: ExchangeState) {
        tracing::debug!(
            from = self.state.label(),
            to = next.label(),
            attempt = self.attempt.attempt_count,
            "Exchange state transition",
        );
        if next == ExchangeState::Cancelled {
            tracing::info!(attempts = self.attempt.attempt_count, "Code exchange cancelled");
        }
        self.state = next;
    }
}
