//! Deepgram pre-recorded transcription
//!
//! A single `POST /v1/listen` returns the whole transcript.

mod client;
pub mod converter;
pub mod types;

pub use client::{DeepgramClient, DEFAULT_BASE_URL};
pub use types::{DeepgramRequest, DeepgramResponse};
