use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use serde_json::Value;

use crate::calendar::event_set::{dedup_by_id, remove_by_id, upsert_by_id};
use crate::calendar::EventRecord;
use crate::storage::backend::{BackendKind, PersistenceBackend, StorageError};
use crate::storage::config::LocalConfig;
use crate::sync::transport::SnapshotReceiver;

/// Event set kept as one JSON array under a single key of an SQLite
/// key/value table. Every mutation rewrites the whole value; entries that
/// could not be read are carried along unchanged.
pub struct LocalBackend {
    conn: Connection,
    key: String,
    records: Option<Vec<EventRecord>>,
    unreadable: Vec<Value>,
}

impl LocalBackend {
    pub fn new(conn: Connection, key: impl Into<String>) -> Result<Self, StorageError> {
        let backend = Self {
            conn,
            key: key.into(),
            records: None,
            unreadable: Vec::new(),
        };
        backend.initialize()?;
        Ok(backend)
    }

    pub fn open(config: &LocalConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&config.database_path)?;
        tracing::info!("Opened local store at {}", config.database_path.display());
        Self::new(conn, config.storage_key.clone())
    }

    pub fn in_memory(key: impl Into<String>) -> Result<Self, StorageError> {
        Self::new(Connection::open_in_memory()?, key)
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Key under which an unreadable blob, or a blob with unreadable
    /// entries, is kept for inspection.
    pub fn corrupt_key(&self) -> String {
        format!("{}.corrupt", self.key)
    }

    pub fn read_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn write_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        );
        result.unwrap_or(0) > 0
    }

    fn write_events(&self, events: &[EventRecord]) -> Result<(), StorageError> {
        let mut values = events
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        values.extend(self.unreadable.iter().cloned());
        let data = serde_json::to_string(&values)?;
        self.write_value(&self.key, &data)
    }

    async fn records_mut(&mut self) -> Result<&mut Vec<EventRecord>, StorageError> {
        if self.records.is_none() {
            self.load().await?;
        }
        Ok(self.records.get_or_insert_with(Vec::new))
    }
}

/// Stored array split into migrated records and the raw entries that
/// could not be migrated.
#[derive(Debug, Default)]
pub struct ParsedEvents {
    pub records: Vec<EventRecord>,
    pub unreadable: Vec<Value>,
}

/// Parses the stored array, migrating each entry. A blob that is not a
/// JSON array is an error.
pub fn parse_events(blob: &str) -> Result<ParsedEvents, StorageError> {
    let values: Vec<Value> =
        serde_json::from_str(blob).map_err(|e| StorageError::ParseError(e.to_string()))?;

    let mut records = Vec::with_capacity(values.len());
    let mut unreadable = Vec::new();
    for value in values {
        match serde_json::from_value::<EventRecord>(value.clone()) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable stored event: {}", e);
                unreadable.push(value);
            }
        }
    }

    Ok(ParsedEvents {
        records: dedup_by_id(records),
        unreadable,
    })
}

#[async_trait]
impl PersistenceBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn load(&mut self) -> Result<Vec<EventRecord>, StorageError> {
        let parsed = match self.read_value(&self.key)? {
            None => ParsedEvents::default(),
            Some(blob) => match parse_events(&blob) {
                Ok(parsed) => {
                    if !parsed.unreadable.is_empty() {
                        let corrupt_key = self.corrupt_key();
                        tracing::warn!(
                            "{} unreadable events kept in place, blob copied to {}",
                            parsed.unreadable.len(),
                            corrupt_key
                        );
                        self.write_value(&corrupt_key, &blob)?;
                    }
                    parsed
                }
                Err(e) => {
                    let corrupt_key = self.corrupt_key();
                    tracing::warn!("{}; starting empty and keeping the blob under {}", e, corrupt_key);
                    self.write_value(&corrupt_key, &blob)?;
                    ParsedEvents::default()
                }
            },
        };

        let ParsedEvents { records, unreadable } = parsed;
        tracing::info!("Loaded {} events from local storage", records.len());
        self.records = Some(records.clone());
        self.unreadable = unreadable;
        Ok(records)
    }

    async fn upsert(&mut self, record: &EventRecord) -> Result<(), StorageError> {
        let mut next = self.records_mut().await?.clone();
        upsert_by_id(&mut next, record.clone());
        self.write_events(&next)?;
        tracing::debug!("Stored event {} locally", record.id);
        self.records = Some(next);
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<(), StorageError> {
        let mut next = self.records_mut().await?.clone();
        if !remove_by_id(&mut next, id) {
            tracing::debug!("Delete of unknown event {} ignored", id);
            return Ok(());
        }
        self.write_events(&next)?;
        tracing::debug!("Deleted event {} locally", id);
        self.records = Some(next);
        Ok(())
    }

    fn subscribe(&mut self) -> Option<SnapshotReceiver> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventForm;
    use crate::storage::config::DEFAULT_STORAGE_KEY;

    fn create_test_backend() -> LocalBackend {
        LocalBackend::in_memory(DEFAULT_STORAGE_KEY).unwrap()
    }

    fn create_test_event(id: &str, title: &str) -> EventRecord {
        EventRecord::from_form(&EventForm {
            id: Some(id.to_string()),
            title: title.to_string(),
            category: "travel".to_string(),
            start_date: "2024-03-10".to_string(),
            start_time: "19:30".to_string(),
            end_date: "2024-03-12".to_string(),
            location: "Porto".to_string(),
            description: "Two lines\nof notes".to_string(),
            ..EventForm::default()
        })
        .unwrap()
    }

    #[test]
    fn creates_key_value_table() {
        let backend = create_test_backend();

        assert!(backend.table_exists("kv_store"));
    }

    #[tokio::test]
    async fn empty_store_loads_no_events() {
        let mut backend = create_test_backend();

        let events = backend.load().await.unwrap();

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn upsert_writes_whole_array_under_key() {
        let mut backend = create_test_backend();
        backend.load().await.unwrap();

        backend.upsert(&create_test_event("a", "First")).await.unwrap();
        backend.upsert(&create_test_event("b", "Second")).await.unwrap();

        let blob = backend.read_value(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&blob).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["id"], "a");
        assert_eq!(values[1]["startDate"], "2024-03-10");
    }

    #[tokio::test]
    async fn upsert_existing_replaces_in_place() {
        let mut backend = create_test_backend();
        backend.upsert(&create_test_event("a", "First")).await.unwrap();
        backend.upsert(&create_test_event("b", "Second")).await.unwrap();

        backend.upsert(&create_test_event("a", "First, renamed")).await.unwrap();

        let events = backend.load().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "a");
        assert_eq!(events[0].title, "First, renamed");
    }

    #[tokio::test]
    async fn upsert_before_load_keeps_existing_data() {
        let mut backend = create_test_backend();
        backend.upsert(&create_test_event("a", "First")).await.unwrap();
        backend.records = None;

        backend.upsert(&create_test_event("b", "Second")).await.unwrap();

        assert_eq!(backend.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_event() {
        let mut backend = create_test_backend();
        backend.upsert(&create_test_event("a", "First")).await.unwrap();
        backend.upsert(&create_test_event("b", "Second")).await.unwrap();

        backend.delete("a").await.unwrap();

        let events = backend.load().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "b");
    }

    #[tokio::test]
    async fn delete_unknown_event_is_noop() {
        let mut backend = create_test_backend();
        backend.upsert(&create_test_event("a", "First")).await.unwrap();

        backend.delete("missing").await.unwrap();

        assert_eq!(backend.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fresh_backend_reads_what_another_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            database_path: dir.path().join("nested").join("calendar.db"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        };
        let event = create_test_event("a", "Dinner");

        {
            let mut writer = LocalBackend::open(&config).unwrap();
            writer.load().await.unwrap();
            writer.upsert(&event).await.unwrap();
        }

        let mut reader = LocalBackend::open(&config).unwrap();
        let events = reader.load().await.unwrap();

        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn legacy_blob_is_migrated_on_load() {
        let mut backend = create_test_backend();
        backend
            .write_value(
                DEFAULT_STORAGE_KEY,
                r##"[{"id":"1","title":"Dinner","date":"2024-03-10","time":"19:30","description":"","color":"#ff0000","lastModified":"2024-03-01T10:00:00.000Z"}]"##,
            )
            .unwrap();

        let events = backend.load().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_date.to_string(), "2024-03-10");
        assert_eq!(events[0].color(), crate::calendar::Category::FALLBACK.color());
    }

    #[tokio::test]
    async fn corrupt_blob_loads_empty_and_is_preserved() {
        let mut backend = create_test_backend();
        backend.write_value(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let events = backend.load().await.unwrap();

        assert!(events.is_empty());
        assert_eq!(
            backend.read_value(&backend.corrupt_key()).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[tokio::test]
    async fn unreadable_entries_are_skipped() {
        let mut backend = create_test_backend();
        backend
            .write_value(
                DEFAULT_STORAGE_KEY,
                r#"[{"id":"1","title":"Ok","startDate":"2024-03-10"},{"id":"2","title":"No date"},42]"#,
            )
            .unwrap();

        let events = backend.load().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "1");
    }

    #[tokio::test]
    async fn unreadable_entries_survive_later_writes() {
        let mut backend = create_test_backend();
        let blob = r#"[{"id":"1","title":"Ok","startDate":"2024-03-10"},{"id":"2","title":"Typo","when":"2024-03-11"}]"#;
        backend.write_value(DEFAULT_STORAGE_KEY, blob).unwrap();

        backend.load().await.unwrap();
        backend.upsert(&create_test_event("3", "New")).await.unwrap();
        backend.delete("1").await.unwrap();

        let stored = backend.read_value(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let values: Vec<Value> = serde_json::from_str(&stored).unwrap();
        let ids: Vec<&str> = values.iter().filter_map(|v| v["id"].as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
        assert_eq!(values[1]["when"], "2024-03-11");
        assert_eq!(
            backend.read_value(&backend.corrupt_key()).unwrap().as_deref(),
            Some(blob)
        );

        let events = backend.load().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "3");
    }

    #[test]
    fn parse_events_separates_unreadable_entries() {
        let parsed = parse_events(r#"[{"id":"1","title":"Ok","startDate":"2024-03-10"},42]"#).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.unreadable, vec![serde_json::json!(42)]);
    }

    #[test]
    fn parse_events_rejects_non_array() {
        let result = parse_events(r#"{"id":"1"}"#);

        assert!(matches!(result, Err(StorageError::ParseError(_))));
    }

    #[test]
    fn local_backend_has_no_subscription() {
        let mut backend = create_test_backend();

        assert!(backend.subscribe().is_none());
        assert_eq!(backend.kind(), BackendKind::Local);
    }
}
