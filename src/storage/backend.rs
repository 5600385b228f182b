use async_trait::async_trait;
use thiserror::Error;

use crate::calendar::EventRecord;
use crate::sync::transport::{SnapshotReceiver, TransportError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Stored events are not valid JSON: {0}")]
    ParseError(String),
    #[error("Failed to prepare storage location: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Remote store error: {0}")]
    RemoteError(#[from] TransportError),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

/// Durable storage for the event set.
#[async_trait]
pub trait PersistenceBackend: Send {
    fn kind(&self) -> BackendKind;

    async fn load(&mut self) -> Result<Vec<EventRecord>, StorageError>;

    async fn upsert(&mut self, record: &EventRecord) -> Result<(), StorageError>;

    async fn delete(&mut self, id: &str) -> Result<(), StorageError>;

    /// Whole-collection change notifications. Backends without push support return `None`.
    fn subscribe(&mut self) -> Option<SnapshotReceiver>;
}
