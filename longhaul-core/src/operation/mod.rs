//! Durable asynchronous operations
//!
//! An [`Operation`] is one logical provider call carried from submission to a
//! terminal phase across any number of process restarts:
//!
//! ```text
//! Created ──► Submitted ──► Polling ───► Succeeded
//!    │            │                        ▲
//!    │            └───────► Streaming ─────┤
//!    └─────────────────────────────────────┘   (any non-terminal ──► Failed | Cancelled)
//! ```
//!
//! [`OperationEngine`] is the caller facade. Every transition is written to a
//! [`CheckpointStore`] with compare-and-set before the next provider call, so
//! a resumed engine never repeats a billable `start`.

pub mod checkpoint;
pub mod clock;
pub mod engine;
pub mod error;
mod machine;
pub mod model;

pub use checkpoint::{CheckpointStore, Expected, MemoryCheckpointStore, OperationRecord, StoreError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineBuilder, OperationEngine, OperationHandle, OperationStatus};
pub use error::{EngineError, EngineResult};
pub use machine::ProviderTiming;
pub use model::{
    ErrorClass, Operation, OperationError, OperationId, PartialProgress, Phase, TransitionError,
};
