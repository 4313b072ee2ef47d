//! Storage layer for Folio.
//!
//! Defines the contract the operation pipeline persists through and ships a
//! SQLite reference implementation.
//!
//! # Architecture
//!
//! - A document is a root row plus one row per locale holding its localized
//!   fields, stored as JSON text
//! - Relations, block rows and tree rows live in their own tables, keyed by
//!   the owning document and addressed by field path and position
//! - Version rows hold full document snapshots per locale
//! - All writes of one operation run inside one [`Transaction`]; dropping it
//!   uncommitted rolls every write back

mod adapter;
mod error;
mod files;
mod sqlite;

pub use adapter::{
    FindQuery, RootData, RowTable, Sort, StorageAdapter, StoredDocument, Transaction, VersionRow,
};
pub use error::{StorageError, StorageResult};
pub use files::{FileStore, MemoryFileStore, StoredFile, Upload};
pub use sqlite::{SqliteStorage, SqliteTransaction};
