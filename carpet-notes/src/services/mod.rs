//! Services module
//!
//! Business logic services that sit between the front end and storage.

pub mod assets;
pub mod editor;
pub mod records;
pub mod settings;

pub use assets::{AssetCache, AssetSource, Fetcher, HttpFetcher};
pub use editor::{CarpetRow, CommitForm, CommitOutcome, EditorState, RecordEditor, Totals};
pub use records::RecordStore;
pub use settings::SettingsService;
