//! Provider abstraction, translation and assembly
//!
//! This module implements the provider layer: the [`ProviderClient`] trait
//! and one client per provider, the translator from unified requests to
//! provider payloads, and the assembler from provider results back to
//! unified results.

pub mod adapter;
pub mod assemble;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod transform;

pub mod azure;
pub mod brave;
pub mod deepgram;
pub mod runway;
pub mod stability;
pub mod tavily;

pub use adapter::{
    CancelOutcome, Page, PollOutcome, ProviderClient, ProviderFailure, ProviderKind, StartOutcome,
};
pub use assemble::{assemble, assemble_page, Assembled, ProviderResult};
pub use error::{ClientError, ClientResult};
pub use rate_limit::{RateLimitInfo, RateLimitTracker};
pub use retry::RetryPolicy;
pub use transform::{translate, CodeTable, ProviderPayload, TranslateError};

// Re-export concrete clients
pub use azure::AzureClient;
pub use brave::BraveClient;
pub use deepgram::DeepgramClient;
pub use runway::RunwayClient;
pub use stability::StabilityClient;
pub use tavily::TavilyClient;
