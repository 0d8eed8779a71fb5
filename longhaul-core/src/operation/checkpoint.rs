//! Durable checkpoint store
//!
//! Operations are stored as [`OperationRecord`]s: the phase and revision in
//! the clear, for compare-and-set, plus the JSON-encoded operation. Any
//! mismatch between the two is corruption; decoding never guesses a phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use super::model::{Operation, OperationId, Phase};

/// Errors raised by checkpoint stores and the record codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Stored record cannot be trusted
    #[error("checkpoint for {id} is corrupt: {reason}")]
    Corrupt { id: OperationId, reason: String },

    #[error("failed to encode operation {id}: {message}")]
    Encode { id: OperationId, message: String },

    /// Storage backend failure
    #[error("checkpoint store error: {message}")]
    Backend { message: String },
}

/// One stored operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    pub phase: Phase,
    pub revision: u64,

    /// JSON-encoded [`Operation`]
    pub body: String,
}

impl OperationRecord {
    pub fn encode(operation: &Operation) -> Result<Self, StoreError> {
        let body = serde_json::to_string(operation).map_err(|e| StoreError::Encode {
            id: operation.id().clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            id: operation.id().clone(),
            phase: operation.phase(),
            revision: operation.revision(),
            body,
        })
    }

    pub fn decode(&self) -> Result<Operation, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let operation: Operation = serde_json::from_str(&self.body).map_err(|e| corrupt(e.to_string()))?;

        if operation.id() != &self.id {
            return Err(corrupt(format!("body belongs to {}", operation.id())));
        }
        if operation.phase() != self.phase {
            return Err(corrupt(format!(
                "record says {}, body says {}",
                self.phase,
                operation.phase()
            )));
        }
        if operation.revision() != self.revision {
            return Err(corrupt(format!(
                "record revision {}, body revision {}",
                self.revision,
                operation.revision()
            )));
        }
        operation.validate().map_err(corrupt)?;

        Ok(operation)
    }
}

/// Precondition of a compare-and-set write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No record may exist yet
    Absent,
    /// The stored record must be at exactly this phase and revision
    At { phase: Phase, revision: u64 },
}

impl Expected {
    pub fn of(operation: &Operation) -> Self {
        Expected::At {
            phase: operation.phase(),
            revision: operation.revision(),
        }
    }

    pub fn matches(&self, current: Option<&OperationRecord>) -> bool {
        match (self, current) {
            (Expected::Absent, None) => true,
            (Expected::At { phase, revision }, Some(record)) => {
                record.phase == *phase && record.revision == *revision
            }
            _ => false,
        }
    }
}

/// Storage the state machine checkpoints into
///
/// Implementations must make `compare_and_set` atomic: it is the only
/// mechanism keeping two drivers from advancing one operation.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, id: &OperationId) -> Result<Option<OperationRecord>, StoreError>;

    /// Write `record` if the stored state matches `expected`; `false` if not
    async fn compare_and_set(
        &self,
        id: &OperationId,
        expected: Expected,
        record: OperationRecord,
    ) -> Result<bool, StoreError>;

    /// Delete a record; `false` if there was none
    async fn remove(&self, id: &OperationId) -> Result<bool, StoreError>;

    async fn list_ids(&self) -> Result<Vec<OperationId>, StoreError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<OperationId, OperationRecord>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<OperationId, OperationRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Backend {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, id: &OperationId) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn compare_and_set(
        &self,
        id: &OperationId,
        expected: Expected,
        record: OperationRecord,
    ) -> Result<bool, StoreError> {
        let mut records = self.lock()?;
        if !expected.matches(records.get(id)) {
            return Ok(false);
        }
        records.insert(id.clone(), record);
        Ok(true)
    }

    async fn remove(&self, id: &OperationId) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<OperationId>, StoreError> {
        let mut ids: Vec<_> = self.lock()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
