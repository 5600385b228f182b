use chrono::NaiveDate;
use std::fmt;

use crate::calendar::event_set::{find_by_id, remove_by_id, upsert_by_id};
use crate::calendar::{events_on, EventRecord};
use crate::export::ics::{self, CalendarMeta};
use crate::storage::backend::{BackendKind, PersistenceBackend, StorageError};
use crate::storage::config::{BackendChoice, Config};
use crate::storage::LocalBackend;
use crate::sync::remote::{records_from_snapshot, RemoteBackend};
use crate::sync::transport::{Snapshot, SnapshotReceiver};
use crate::ui::month_view::{render_month, MonthView};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    LocalStorage,
    Connected,
    Syncing,
    Synced,
    Error(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::LocalStorage => write!(f, "Using local storage"),
            SyncStatus::Connected => write!(f, "Connected to cloud"),
            SyncStatus::Syncing => write!(f, "Syncing..."),
            SyncStatus::Synced => write!(f, "Synced ✓"),
            SyncStatus::Error(message) => write!(f, "Sync error: {}", message),
        }
    }
}

/// Owns the authoritative in-memory event list and routes every write
/// through the active backend.
pub struct SyncCoordinator {
    backend: Box<dyn PersistenceBackend>,
    events: Vec<EventRecord>,
    status: SyncStatus,
    changes: Option<SnapshotReceiver>,
}

impl SyncCoordinator {
    /// Uses the remote store when configured and reachable, local storage otherwise.
    pub async fn initialize(config: &Config) -> Result<Self, StorageError> {
        let remote = match config.backend {
            BackendChoice::Remote => RemoteBackend::connect(&config.remote).await,
            BackendChoice::Local => Err(StorageError::Unavailable("local backend selected".to_string())),
        };

        Self::start(remote, || LocalBackend::open(&config.local)).await
    }

    /// Starts with `remote` when it connected, falling back to the backend
    /// produced by `open_local` otherwise.
    pub async fn start<F>(
        remote: Result<RemoteBackend, StorageError>,
        open_local: F,
    ) -> Result<Self, StorageError>
    where
        F: FnOnce() -> Result<LocalBackend, StorageError>,
    {
        match remote {
            Ok(mut backend) => {
                let changes = backend.subscribe();
                tracing::info!("Using remote backend");
                Ok(Self {
                    backend: Box::new(backend),
                    events: Vec::new(),
                    status: SyncStatus::Connected,
                    changes,
                })
            }
            Err(e) => {
                match &e {
                    StorageError::Unavailable(reason) => tracing::info!("Remote backend not used: {}", reason),
                    other => tracing::warn!("Remote backend failed, falling back to local storage: {}", other),
                }
                let mut backend = open_local()?;
                let events = backend.load().await?;
                Ok(Self {
                    backend: Box::new(backend),
                    events,
                    status: SyncStatus::LocalStorage,
                    changes: None,
                })
            }
        }
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn find(&self, id: &str) -> Option<&EventRecord> {
        find_by_id(&self.events, id)
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<&EventRecord> {
        events_on(&self.events, date)
    }

    pub fn month_view(&self, anchor: NaiveDate, today: NaiveDate) -> MonthView {
        render_month(&self.events, anchor, today)
    }

    pub fn export_ics(&self, meta: &CalendarMeta) -> String {
        ics::render(&self.events, meta)
    }

    /// Writes a full replacement of `record`, stamping `last_modified`.
    ///
    /// Remote writes do not touch the local list; the change shows up with the
    /// next snapshot.
    pub async fn save(&mut self, mut record: EventRecord) -> Result<(), StorageError> {
        record.touch();

        match self.backend.kind() {
            BackendKind::Remote => {
                self.status = SyncStatus::Syncing;
                if let Err(e) = self.backend.upsert(&record).await {
                    self.status = SyncStatus::Error(e.to_string());
                    return Err(e);
                }
            }
            BackendKind::Local => {
                self.backend.upsert(&record).await?;
                upsert_by_id(&mut self.events, record);
            }
        }
        Ok(())
    }

    /// Deletes by id. Unknown ids are a no-op.
    pub async fn remove(&mut self, id: &str) -> Result<(), StorageError> {
        match self.backend.kind() {
            BackendKind::Remote => {
                self.status = SyncStatus::Syncing;
                if let Err(e) = self.backend.delete(id).await {
                    self.status = SyncStatus::Error(e.to_string());
                    return Err(e);
                }
            }
            BackendKind::Local => {
                self.backend.delete(id).await?;
                remove_by_id(&mut self.events, id);
            }
        }
        Ok(())
    }

    /// Replaces the whole list with `snapshot`. Unacknowledged local state is discarded.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.events = records_from_snapshot(snapshot);
        self.status = SyncStatus::Synced;
        tracing::info!("Applied snapshot with {} events", self.events.len());
    }

    /// Waits for the next change notification and applies it. Returns `false`
    /// when there is no subscription or it has ended.
    pub async fn next_change(&mut self) -> bool {
        let Some(changes) = self.changes.as_mut() else {
            return false;
        };

        match changes.recv().await {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => {
                tracing::warn!("Remote change feed closed");
                self.changes = None;
                false
            }
        }
    }

    /// Applies every notification already queued, without waiting.
    /// Only the newest snapshot matters, so older ones are skipped.
    pub fn poll_changes(&mut self) -> usize {
        let Some(changes) = self.changes.as_mut() else {
            return 0;
        };

        let mut latest = None;
        let mut received = 0;
        while let Ok(snapshot) = changes.try_recv() {
            latest = Some(snapshot);
            received += 1;
        }

        if let Some(snapshot) = latest {
            self.apply_snapshot(snapshot);
        }
        received
    }
}
