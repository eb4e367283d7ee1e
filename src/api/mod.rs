//! REST collaborator: option read/write and OAuth code exchange endpoints.

pub mod client;
pub mod types;

pub use client::{OptionApi, ProviderExchanger};
pub use types::{ApiResponse, OptionEntry};
