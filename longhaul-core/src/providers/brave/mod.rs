//! Brave Search web results, fetched page by page

mod client;
pub mod converter;
pub mod types;

pub use client::{BraveClient, DEFAULT_BASE_URL};
pub use types::{BraveQuery, BraveResponse};
