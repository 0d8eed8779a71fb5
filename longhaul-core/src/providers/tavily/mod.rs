//! Tavily search; one call returns the complete result set

mod client;
pub mod converter;
pub mod types;

pub use client::{TavilyClient, DEFAULT_BASE_URL};
pub use types::{TavilyRequest, TavilyResponse};
