pub mod exchange;
pub mod provider;

pub use exchange::{
    CodeExchanger, DefaultClassifier, ExchangeAttempt, ExchangeFailure, ExchangeOutcome,
    ExchangeState, ExchangeSuccess, FailureClassifier, RetryExchangeController, RetryPolicy,
};
pub use provider::{CallbackParams, ExchangeFlow, OAuthProvider};
