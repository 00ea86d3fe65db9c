//! Record editor
//!
//! One in-progress edit session: the carpet rows being measured, the
//! identity of the record being edited, and live totals. Only `commit`
//! touches the record store.

use crate::database::models::non_negative;
use crate::database::{Carpet, Measurements, Record, RecordUpdate, Settings};
use crate::error::{AppError, Result, ValidationError};
use crate::notice::Notice;
use crate::services::records::RecordStore;
use chrono::NaiveDate;

/// Measurement values as entered. `None` is an empty or unparseable field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarpetRow {
    pub width: Option<f64>,
    pub length: Option<f64>,
}

impl CarpetRow {
    pub fn new(width: f64, length: f64) -> Self {
        Self {
            width: Some(width),
            length: Some(length),
        }
    }

    /// Parse raw text inputs; a decimal comma is accepted
    pub fn parse(width: &str, length: &str) -> Self {
        Self {
            width: parse_measure(width),
            length: parse_measure(length),
        }
    }

    /// Area with negatives and missing values counted as zero
    pub fn area(&self) -> f64 {
        non_negative(self.width.unwrap_or(0.0)) * non_negative(self.length.unwrap_or(0.0))
    }

    pub fn to_carpet(&self) -> Carpet {
        Carpet::new(self.width.unwrap_or(0.0), self.length.unwrap_or(0.0))
    }
}

impl From<&Carpet> for CarpetRow {
    fn from(carpet: &Carpet) -> Self {
        Self::new(carpet.width, carpet.length)
    }
}

fn parse_measure(input: &str) -> Option<f64> {
    input
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Derived display values for the current rows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Totals {
    /// Area of each row, in row order
    pub areas: Vec<f64>,
    pub total_area: f64,
    pub total_price: f64,
}

/// Form fields other than the carpet rows
#[derive(Debug, Clone, PartialEq)]
pub struct CommitForm {
    pub address: String,
    pub date: NaiveDate,
    pub deadline: Option<NaiveDate>,
    pub is_done: bool,
}

impl CommitForm {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            address: String::new(),
            date,
            deadline: None,
            is_done: false,
        }
    }
}

impl From<&Record> for CommitForm {
    fn from(record: &Record) -> Self {
        Self {
            address: record.address.clone(),
            date: record.date,
            deadline: record.deadline,
            is_done: record.is_done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Closed,
    OpenNew,
    OpenEditing { id: String },
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub record: Record,
    pub notice: Notice,
    /// False when the record is only held in memory
    pub persisted: bool,
}

/// Edit session for a single record
#[derive(Debug)]
pub struct RecordEditor {
    state: EditorState,
    form: Option<CommitForm>,
    rows: Vec<CarpetRow>,
}

impl Default for RecordEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordEditor {
    pub fn new() -> Self {
        Self {
            state: EditorState::Closed,
            form: None,
            rows: Vec::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != EditorState::Closed
    }

    pub fn rows(&self) -> &[CarpetRow] {
        &self.rows
    }

    /// Initial form values for the open session
    pub fn form(&self) -> Option<&CommitForm> {
        self.form.as_ref()
    }

    /// Start a new record with one empty row
    pub fn open_new(&mut self, date: NaiveDate) {
        tracing::debug!("Opening editor for a new record on {}", date);
        self.state = EditorState::OpenNew;
        self.form = Some(CommitForm::empty(date));
        self.rows = vec![CarpetRow::default()];
    }

    /// Start editing `record`, copying its carpets
    pub fn open_existing(&mut self, record: &Record) {
        tracing::debug!("Opening editor for record {}", record.id);
        self.state = EditorState::OpenEditing {
            id: record.id.clone(),
        };
        self.form = Some(CommitForm::from(record));
        self.rows = record.carpets.iter().map(CarpetRow::from).collect();
        if self.rows.is_empty() {
            self.rows.push(CarpetRow::default());
        }
    }

    /// Append a row, pre-filled from `initial` or empty
    pub fn add_carpet_row(
        &mut self,
        initial: Option<CarpetRow>,
        settings: &Settings,
    ) -> Result<Totals> {
        self.ensure_open()?;
        self.rows.push(initial.unwrap_or_default());
        Ok(self.recompute_totals(settings))
    }

    /// Replace the values of the row at `index`
    pub fn set_carpet_row(
        &mut self,
        index: usize,
        row: CarpetRow,
        settings: &Settings,
    ) -> Result<Totals> {
        self.ensure_open()?;
        let slot = self
            .rows
            .get_mut(index)
            .ok_or(AppError::RowOutOfRange(index))?;
        *slot = row;
        Ok(self.recompute_totals(settings))
    }

    /// Remove the row at `index`, refusing to remove the last one
    pub fn remove_carpet_row(&mut self, index: usize, settings: &Settings) -> Result<Totals> {
        self.ensure_open()?;
        if self.rows.len() <= 1 {
            tracing::warn!("Refusing to remove the last carpet row");
            return Err(AppError::RowRemovalRejected);
        }
        if index >= self.rows.len() {
            return Err(AppError::RowOutOfRange(index));
        }
        self.rows.remove(index);
        Ok(self.recompute_totals(settings))
    }

    /// Per-row areas, total area and price for the current rows
    pub fn recompute_totals(&self, settings: &Settings) -> Totals {
        let areas: Vec<f64> = self.rows.iter().map(CarpetRow::area).collect();
        let total_area: f64 = areas.iter().sum();
        Totals {
            areas,
            total_area,
            total_price: total_area * settings.rate_per_sq_m,
        }
    }

    /// Validate and save the session into `store`.
    ///
    /// An empty address fails with `EmptyAddress` and leaves both the
    /// session and the store untouched. On success the session closes.
    pub async fn commit(
        &mut self,
        form: CommitForm,
        settings: &Settings,
        store: &mut RecordStore,
    ) -> Result<CommitOutcome> {
        self.ensure_open()?;

        let address = form.address.trim();
        if address.is_empty() {
            return Err(ValidationError::EmptyAddress.into());
        }

        let totals = self.recompute_totals(settings);
        let editing_id = match &self.state {
            EditorState::OpenEditing { id } => Some(id.clone()),
            _ => None,
        };

        let update = RecordUpdate {
            id: editing_id.clone(),
            address: Some(address.to_string()),
            date: Some(form.date),
            deadline: Some(form.deadline),
            is_done: Some(form.is_done),
            measurements: Some(Measurements {
                carpets: self.rows.iter().map(CarpetRow::to_carpet).collect(),
                total_area: totals.total_area,
                total_price: totals.total_price,
            }),
        };

        let record = store.upsert(update);
        let persisted = store.persist().await;

        let notice = if editing_id.as_deref() == Some(record.id.as_str()) {
            Notice::RecordUpdated
        } else {
            Notice::RecordCreated
        };
        tracing::info!("{:?}: {} ({})", notice, record.id, record.address);

        self.close();

        Ok(CommitOutcome {
            record,
            notice,
            persisted,
        })
    }

    /// Discard the session without saving
    pub fn cancel(&mut self) {
        if self.is_open() {
            tracing::debug!("Editor cancelled");
        }
        self.close();
    }

    fn close(&mut self) {
        self.state = EditorState::Closed;
        self.form = None;
        self.rows.clear();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::EditorClosed)
        }
    }
}
