//! Application state and initialization
//!
//! `AppState` is the one value a front end holds: the day being viewed, the
//! settings and record services, and the editor session. Nothing here is
//! global; every operation goes through an explicit `&mut AppState`.

use crate::config::{ASSET_CACHE_DIR_NAME, DATABASE_FILE_NAME};
use crate::database::{create_pool, Currency, Record, Repository, Settings};
use crate::error::{AppError, Result};
use crate::format::shift_date;
use crate::notice::Notice;
use crate::services::{
    AssetCache, CarpetRow, CommitForm, CommitOutcome, RecordEditor, RecordStore, SettingsService,
    Totals,
};
use chrono::{Local, NaiveDate};
use reqwest::Url;
use std::path::PathBuf;

/// Central application state
pub struct AppState {
    data_dir: PathBuf,
    current_date: NaiveDate,
    repo: Repository,
    settings: SettingsService,
    records: RecordStore,
    editor: RecordEditor,
}

impl AppState {
    /// Open (or create) the data directory and load persisted state
    pub async fn open(data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", data_dir);

        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(data_dir.join(ASSET_CACHE_DIR_NAME))?;

        let pool = create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;
        let state = Self::with_repository(data_dir, Repository::new(pool)).await;

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Build state over an already initialized repository
    pub async fn with_repository(data_dir: PathBuf, repo: Repository) -> Self {
        let settings = SettingsService::open(repo.clone()).await;
        let records = RecordStore::open(repo.clone()).await;
        Self {
            data_dir,
            current_date: Local::now().date_naive(),
            repo,
            settings,
            records,
            editor: RecordEditor::new(),
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn editor(&self) -> &RecordEditor {
        &self.editor
    }

    // ===== Date navigation =====

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.current_date = date;
    }

    /// Move the viewed day forward or back
    pub fn change_date(&mut self, days: i64) -> NaiveDate {
        self.current_date = shift_date(self.current_date, days);
        self.current_date
    }

    /// Records of the viewed day, in insertion order
    pub fn records_for_current_date(&self) -> Vec<&Record> {
        self.records.filter_by_date(self.current_date)
    }

    // ===== Editor =====

    /// Open the editor for a new record on the viewed day
    pub fn begin_new_record(&mut self) -> Totals {
        self.editor.open_new(self.current_date);
        self.editor.recompute_totals(&self.settings.current())
    }

    /// Open the editor on an existing record
    pub fn begin_edit(&mut self, id: &str) -> Result<Totals> {
        let record = self
            .records
            .find_by_id(id)
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;
        self.editor.open_existing(record);
        Ok(self.editor.recompute_totals(&self.settings.current()))
    }

    pub fn add_carpet_row(&mut self, initial: Option<CarpetRow>) -> Result<Totals> {
        self.editor
            .add_carpet_row(initial, &self.settings.current())
    }

    pub fn set_carpet_row(&mut self, index: usize, row: CarpetRow) -> Result<Totals> {
        self.editor
            .set_carpet_row(index, row, &self.settings.current())
    }

    pub fn remove_carpet_row(&mut self, index: usize) -> Result<Totals> {
        self.editor
            .remove_carpet_row(index, &self.settings.current())
    }

    /// Commit the editor session into the record store
    pub async fn save_record(&mut self, form: CommitForm) -> Result<CommitOutcome> {
        let settings = self.settings.current();
        self.editor.commit(form, &settings, &mut self.records).await
    }

    pub fn cancel_edit(&mut self) {
        self.editor.cancel();
    }

    // ===== Settings =====

    /// Validate and store new pricing settings
    pub async fn save_settings(&mut self, rate_input: &str, currency: Currency) -> Result<Notice> {
        let persisted = self.settings.update_settings(rate_input, currency).await?;
        Ok(if persisted {
            Notice::SettingsSaved
        } else {
            Notice::StorageWriteFailed
        })
    }

    // ===== Assets =====

    /// Offline asset cache living in the data directory
    pub fn asset_cache(&self, origin: Url) -> AssetCache {
        AssetCache::new(self.data_dir.join(ASSET_CACHE_DIR_NAME), origin)
    }

    /// Close storage. Every change was written when it was made, so
    /// nothing is flushed here.
    pub async fn shutdown(self) {
        self.repo.close().await;
        tracing::info!("Application shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_pool;
    use crate::format::parse_date;

    async fn create_test_state() -> AppState {
        let repo = Repository::new(memory_pool().await);
        let mut state = AppState::with_repository(PathBuf::from("unused"), repo).await;
        state.set_date(parse_date("2024-01-10").unwrap());
        state
    }

    fn form(state: &AppState, address: &str) -> CommitForm {
        CommitForm {
            address: address.to_string(),
            ..CommitForm::empty(state.current_date())
        }
    }

    #[tokio::test]
    async fn test_add_record_for_current_day() {
        let mut state = create_test_state().await;

        state.begin_new_record();
        state.set_carpet_row(0, CarpetRow::new(2.0, 3.0)).unwrap();
        let outcome = state.save_record(form(&state, "Main St 5")).await.unwrap();

        assert_eq!(outcome.record.date, parse_date("2024-01-10").unwrap());
        assert_eq!(state.records_for_current_date().len(), 1);

        state.change_date(1);
        assert!(state.records_for_current_date().is_empty());
        state.change_date(-1);
        assert_eq!(state.records_for_current_date()[0].id, outcome.record.id);
    }

    #[tokio::test]
    async fn test_begin_edit_unknown_record() {
        let mut state = create_test_state().await;

        let err = state.begin_edit("missing").unwrap_err();

        assert!(matches!(err, AppError::RecordNotFound(id) if id == "missing"));
        assert!(!state.editor().is_open());
    }

    #[tokio::test]
    async fn test_currency_change_keeps_stored_prices() {
        let mut state = create_test_state().await;
        state.begin_new_record();
        state.set_carpet_row(0, CarpetRow::new(2.0, 3.0)).unwrap();
        let record = state
            .save_record(form(&state, "Main St 5"))
            .await
            .unwrap()
            .record;

        let notice = state.save_settings("2000", Currency::USD).await.unwrap();

        assert_eq!(notice, Notice::SettingsSaved);
        let stored = state.records().find_by_id(&record.id).unwrap();
        assert_eq!(stored.total_price, 6000.0);
        assert_eq!(state.records().load_records().await[0].total_price, 6000.0);
    }

    #[tokio::test]
    async fn test_live_totals_use_current_rate() {
        let mut state = create_test_state().await;
        state.save_settings("500", Currency::KZT).await.unwrap();

        state.begin_new_record();
        let totals = state.set_carpet_row(0, CarpetRow::new(2.0, 2.0)).unwrap();

        assert_eq!(totals.total_price, 2000.0);
    }
}
