//! Storage module
//!
//! Provides blob storage for cached asset bodies.

pub mod blob_store;

pub use blob_store::BlobStore;
