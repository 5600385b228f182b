use async_trait::async_trait;
use std::sync::Arc;

use crate::calendar::event_set::dedup_by_id;
use crate::calendar::EventRecord;
use crate::storage::backend::{BackendKind, PersistenceBackend, StorageError};
use crate::storage::config::RemoteConfig;
use crate::sync::transport::{RealtimeTransport, RestTransport, Snapshot, SnapshotReceiver};

/// Event set stored as one child per record under a shared collection.
pub struct RemoteBackend {
    transport: Arc<dyn RealtimeTransport>,
}

impl RemoteBackend {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self { transport }
    }

    /// Builds the REST transport and probes the collection once. Any failure
    /// means the remote store is not usable.
    pub async fn connect(config: &RemoteConfig) -> Result<Self, StorageError> {
        if !config.is_configured() {
            return Err(StorageError::Unavailable("no database URL configured".to_string()));
        }

        let transport = RestTransport::new(config)?;
        transport.fetch().await?;
        tracing::info!("Connected to remote collection '{}'", config.collection);

        Ok(Self::new(Arc::new(transport)))
    }
}

/// Converts a snapshot into the in-memory list, migrating every entry.
/// Entries without an `id` field take their key as id; entries that cannot be
/// migrated are skipped.
pub fn records_from_snapshot(snapshot: Snapshot) -> Vec<EventRecord> {
    let records = snapshot.into_iter().filter_map(|(key, mut value)| {
        if let Some(fields) = value.as_object_mut()
            && !fields.get("id").is_some_and(|id| id.as_str().is_some_and(|id| !id.is_empty()))
        {
            fields.insert("id".to_string(), serde_json::Value::String(key.clone()));
        }

        match serde_json::from_value::<EventRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable remote event {}: {}", key, e);
                None
            }
        }
    });

    dedup_by_id(records)
}

#[async_trait]
impl PersistenceBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load(&mut self) -> Result<Vec<EventRecord>, StorageError> {
        let snapshot = self.transport.fetch().await?;
        Ok(records_from_snapshot(snapshot))
    }

    async fn upsert(&mut self, record: &EventRecord) -> Result<(), StorageError> {
        let value = serde_json::to_value(record)?;
        tracing::info!("Writing event {} to remote", record.id);
        self.transport.set(&record.id, value).await?;
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<(), StorageError> {
        tracing::info!("Removing event {} from remote", id);
        self.transport.remove(id).await?;
        Ok(())
    }

    fn subscribe(&mut self) -> Option<SnapshotReceiver> {
        Some(self.transport.watch())
    }
}
