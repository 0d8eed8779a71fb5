//! Azure AI Speech batch transcription
//!
//! Jobs are created under `/transcriptions`, polled until `Succeeded`, and
//! their transcript is downloaded from the job's file listing.

mod client;
pub mod converter;
pub mod types;

pub use client::{AzureClient, API_PATH};
pub use types::{AzureTranscript, AzureTranscriptionRequest};
