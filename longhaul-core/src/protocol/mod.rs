//! Unified request and result shapes
//!
//! These are the provider-agnostic data models callers work with:
//! - one request type per capability (video generation and upscaling,
//!   transcription, search)
//! - one result type per domain plus a chunk type for paginated kinds
//! - serializable, so an operation's request can be checkpointed and replayed

pub mod types;

pub use types::{
    AspectRatio, AudioFormat, ImageInput, ImageRole, MediaSource, OperationKind, SafeSearch,
    SearchHit, SearchPage, SearchRequest, StreamSummary, TimeRange, Transcript,
    TranscriptSegment, TranscriptionRequest, UnifiedChunk, UnifiedRequest, UnifiedResult,
    UpscaleRequest, Video, VideoOutput, VideoRequest,
};
