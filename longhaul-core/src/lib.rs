//! Longhaul Core Library
//!
//! Durable long-running operations over video generation, speech-to-text and
//! web search providers. Callers submit one unified request shape per
//! capability; the engine translates it for the chosen provider, drives the
//! provider's job to completion by polling or page fetching, and checkpoints
//! every step so a restarted process resumes without repeating billable calls.
//!
//! ```no_run
//! use std::sync::Arc;
//! use longhaul_core::config;
//! use longhaul_core::operation::{MemoryCheckpointStore, OperationEngine, OperationId};
//! use longhaul_core::protocol::VideoRequest;
//! use longhaul_core::providers::ProviderKind;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = config::load("longhaul.yaml")?;
//! let engine = OperationEngine::from_config(&config, Arc::new(MemoryCheckpointStore::new()))?;
//!
//! let request = VideoRequest::from_image_url("https://example.com/cat.png").with_prompt("the cat waves");
//! let handle = engine.submit(OperationId::new_v4(), ProviderKind::Runway, request).await?;
//! let status = engine.run(&handle).await?;
//! println!("{:?}", status.result);
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod http;
pub mod operation;
pub mod protocol;
pub mod providers;

/// Returns the version of the Longhaul Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
