//! Record store
//!
//! Owns the job records for the session and persists the whole collection
//! as one JSON array in the key-value store. Lookups and upserts work on the
//! in-memory collection; callers decide when to persist.

use crate::config::{ID_RANDOM_SUFFIX_LEN, RECORDS_KEY};
use crate::database::{Record, RecordUpdate, Repository};
use crate::error::Result;
use chrono::{Local, NaiveDate, Utc};
use rand::Rng;
use serde_json::Value;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Store for job records
pub struct RecordStore {
    repo: Repository,
    records: Vec<Record>,
}

impl RecordStore {
    /// Open the store, loading persisted records
    pub async fn open(repo: Repository) -> Self {
        let mut store = Self {
            repo,
            records: Vec::new(),
        };
        store.reload().await;
        store
    }

    /// Read records from storage. Missing or malformed data yields an empty list.
    pub async fn load_records(&self) -> Vec<Record> {
        match self.repo.get_value(RECORDS_KEY).await {
            Ok(Some(raw)) => decode_records(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read records, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the in-memory collection with what storage holds
    pub async fn reload(&mut self) {
        self.records = self.load_records().await;
        tracing::info!("Loaded {} records", self.records.len());
    }

    /// Persist `records` as the whole stored collection.
    ///
    /// Returns whether the write reached storage; failures are logged only.
    pub async fn save_records(&self, records: &[Record]) -> bool {
        match self.write(records).await {
            Ok(()) => {
                tracing::debug!("Saved {} records", records.len());
                true
            }
            Err(e) => {
                tracing::error!("Failed to save records: {}", e);
                false
            }
        }
    }

    /// Persist the in-memory collection
    pub async fn persist(&self) -> bool {
        self.save_records(&self.records).await
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Linear lookup by identifier
    pub fn find_by_id(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Merge `update` into the record with the same id, or append a new one.
    ///
    /// Fields absent from the update are preserved on merge. An update with
    /// no id or an unknown id creates a record with a fresh id. Does not
    /// persist.
    pub fn upsert(&mut self, update: RecordUpdate) -> Record {
        if let Some(id) = update.id.as_deref() {
            if let Some(existing) = self.records.iter_mut().find(|r| r.id == id) {
                update.apply_to(existing);
                tracing::debug!("Updated record: {}", existing.id);
                return existing.clone();
            }
            tracing::warn!("Record {} not found, creating a new one", id);
        }

        let id = self.unused_id();
        let record = Record::from_update(id, update, Local::now().date_naive());
        tracing::debug!("Created record: {}", record.id);
        self.records.push(record.clone());
        record
    }

    /// Records for one day, in insertion order
    pub fn filter_by_date(&self, date: NaiveDate) -> Vec<&Record> {
        self.records.iter().filter(|r| r.date == date).collect()
    }

    fn unused_id(&self) -> String {
        loop {
            let id = generate_id();
            if self.find_by_id(&id).is_none() {
                return id;
            }
        }
    }

    async fn write(&self, records: &[Record]) -> Result<()> {
        let content = serde_json::to_string(records)?;
        self.repo.set_value(RECORDS_KEY, &content).await
    }
}

/// Millisecond timestamp followed by random base-36 characters
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_RANDOM_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

fn decode_records(raw: &str) -> Vec<Record> {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            tracing::warn!("Stored records are not an array, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to parse records, starting empty: {}", e);
            return Vec::new();
        }
    };

    let total = entries.len();
    let records: Vec<Record> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<Record>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable record #{}: {}", idx, e);
                None
            }
        })
        .collect();

    if records.len() != total {
        tracing::warn!("Recovered {} of {} stored records", records.len(), total);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_pool, Carpet, Measurements};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_job(address: &str, day: &str) -> RecordUpdate {
        RecordUpdate {
            address: Some(address.to_string()),
            date: Some(date(day)),
            deadline: Some(None),
            is_done: Some(false),
            measurements: Some(Measurements {
                carpets: vec![Carpet::new(2.0, 3.0)],
                total_area: 6.0,
                total_price: 6000.0,
            }),
            ..RecordUpdate::default()
        }
    }

    async fn create_test_store() -> (RecordStore, Repository) {
        let repo = Repository::new(memory_pool().await);
        let store = RecordStore::open(repo.clone()).await;
        (store, repo)
    }

    #[tokio::test]
    async fn test_empty_on_first_run() {
        let (store, _repo) = create_test_store().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_new_assigns_id() {
        let (mut store, _repo) = create_test_store().await;

        let record = store.upsert(new_job("Main St 5", "2024-01-10"));

        assert!(!record.id.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_id(&record.id), Some(&record));
    }

    #[tokio::test]
    async fn test_upsert_existing_merges_in_place() {
        let (mut store, _repo) = create_test_store().await;
        let first = store.upsert(new_job("Main St 5", "2024-01-10"));
        store.upsert(new_job("Oak Ave 1", "2024-01-10"));

        let updated = store.upsert(RecordUpdate {
            id: Some(first.id.clone()),
            is_done: Some(true),
            ..RecordUpdate::default()
        });

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].id, first.id);
        assert!(updated.is_done);
        assert_eq!(updated.address, "Main St 5");
        assert_eq!(updated.carpets, first.carpets);
        assert_eq!(updated.total_price, 6000.0);
    }

    #[tokio::test]
    async fn test_upsert_unknown_id_appends() {
        let (mut store, _repo) = create_test_store().await;

        let record = store.upsert(RecordUpdate {
            id: Some("missing".to_string()),
            ..new_job("Main St 5", "2024-01-10")
        });

        assert_ne!(record.id, "missing");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_by_date_keeps_order() {
        let (mut store, _repo) = create_test_store().await;
        let a = store.upsert(new_job("A", "2024-01-10"));
        store.upsert(new_job("B", "2024-01-11"));
        let c = store.upsert(new_job("C", "2024-01-10"));

        let ids: Vec<&str> = store
            .filter_by_date(date("2024-01-10"))
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec![a.id.as_str(), c.id.as_str()]);

        assert!(store.filter_by_date(date("2030-01-01")).is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let (mut store, repo) = create_test_store().await;
        let record = store.upsert(new_job("Main St 5", "2024-01-10"));
        assert!(store.persist().await);

        let reopened = RecordStore::open(repo).await;
        assert_eq!(reopened.records(), &[record]);
    }

    #[tokio::test]
    async fn test_save_of_loaded_records_is_noop() {
        let (mut store, repo) = create_test_store().await;
        store.upsert(new_job("A", "2024-01-10"));
        store.upsert(new_job("B", "2024-01-11"));
        store.persist().await;
        let before = repo.get_value(RECORDS_KEY).await.unwrap();

        let loaded = store.load_records().await;
        assert!(store.save_records(&loaded).await);

        let after = repo.get_value(RECORDS_KEY).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_malformed_storage_yields_empty() {
        let (_store, repo) = create_test_store().await;

        repo.set_value(RECORDS_KEY, "not json").await.unwrap();
        assert!(RecordStore::open(repo.clone()).await.is_empty());

        repo.set_value(RECORDS_KEY, r#"{"id":"1"}"#).await.unwrap();
        assert!(RecordStore::open(repo).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_entries_are_skipped() {
        let (_store, repo) = create_test_store().await;
        repo.set_value(
            RECORDS_KEY,
            r#"[{"id":"1","address":"A","date":"2024-01-10"},{"address":"no id"},42]"#,
        )
        .await
        .unwrap();

        let store = RecordStore::open(repo).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].address, "A");
        assert_eq!(store.records()[0].total_area, 0.0);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_in_memory_records() {
        let (mut store, repo) = create_test_store().await;
        store.upsert(new_job("A", "2024-01-10"));
        repo.close().await;

        assert!(!store.persist().await);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        let (millis, suffix) = id.split_at(id.len() - ID_RANDOM_SUFFIX_LEN);

        assert!(millis.parse::<i64>().is_ok());
        assert!(suffix.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_id(), generate_id());
    }
}
