//! studytrack-store — Persistent profile storage.
//!
//! Stores one revisioned JSON document per student and implements the
//! `ProfileStore` trait on top of it with compare-and-swap commits, plus the
//! configuration loader and backend factory used by the CLI.

pub mod config;
pub mod document;
pub mod file;
pub mod locks;
pub mod mock;

pub use config::{
    create_store, create_store_with_fallback, load_config, load_config_from, BackendConfig,
    StudytrackConfig,
};
pub use document::{Document, DocumentBackend, DocumentStore, FieldWrite, RetryPolicy};
pub use file::FileBackend;
pub use locks::KeyedLocks;
pub use mock::MockDocuments;
