//! Errors surfaced by the operation engine

use thiserror::Error;

use super::checkpoint::StoreError;
use super::model::{ErrorClass, OperationError, OperationId, PartialProgress, Phase, TransitionError};
use crate::config::ConfigError;
use crate::providers::{ClientError, ProviderKind};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("operation {id} not found")]
    NotFound { id: OperationId },

    #[error("no client configured for provider {provider}")]
    UnknownProvider { provider: ProviderKind },

    /// Same id submitted again with a different request
    #[error("operation {id} already exists with a different request")]
    DuplicateOperation { id: OperationId },

    #[error("operation {id} is already {phase}")]
    AlreadyTerminal { id: OperationId, phase: Phase },

    #[error("operation {id} is still {phase}")]
    NotTerminal { id: OperationId, phase: Phase },

    #[error("operation {id} on {provider} does not produce pages")]
    NotStreamable { id: OperationId, provider: ProviderKind },

    /// The operation reached `Failed`; stream progress so far is attached
    #[error("operation {id} failed: {error}")]
    OperationFailed {
        id: OperationId,
        error: OperationError,
        partial: PartialProgress,
    },

    /// Another driver advanced the operation first
    #[error("operation {id} is driven elsewhere (stored phase {phase})")]
    OwnedElsewhere { id: OperationId, phase: Phase },

    #[error("checkpoint for {id} is corrupt: {reason}")]
    CheckpointCorruption { id: OperationId, reason: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("failed to build provider client: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Error class for failures that map onto the operation taxonomy
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            EngineError::OperationFailed { error, .. } => Some(error.class),
            EngineError::CheckpointCorruption { .. } => Some(ErrorClass::CheckpointCorruption),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { id, reason } => EngineError::CheckpointCorruption { id, reason },
            other => EngineError::Store(other),
        }
    }
}
