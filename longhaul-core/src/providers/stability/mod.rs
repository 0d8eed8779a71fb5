//! Stability AI stable video diffusion
//!
//! Generations are submitted as multipart forms and their result endpoint
//! answers `202` until the clip is ready.

mod client;
pub mod converter;
pub mod types;

pub use client::{StabilityClient, DEFAULT_BASE_URL};
pub use types::{StabilityRequest, StabilityVideo};
