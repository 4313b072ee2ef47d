//! The storage contract the pipeline writes through.
//!
//! Reads go straight to the adapter. Every write of one pipeline run goes
//! through a single [`Transaction`]; dropping it without calling
//! [`Transaction::commit`] rolls all of them back.

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_model::{Data, DocumentStatus, FieldPath, RelationRecord, TreeBlock};
use folio_types::{DocumentId, Locale, RowId, VersionId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Which flattened-row table a row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowTable {
    /// Polymorphic block rows.
    Blocks,
    /// Tree nodes.
    Tree,
}

impl RowTable {
    pub fn table_name(self) -> &'static str {
        match self {
            RowTable::Blocks => "blocks",
            RowTable::Tree => "tree_blocks",
        }
    }
}

impl fmt::Display for RowTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A root row with all of its locale rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub collection: String,
    pub shared: Data,
    pub localized: BTreeMap<Locale, Data>,
    pub status: Option<DocumentStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn has_locale(&self, locale: &Locale) -> bool {
        self.localized.contains_key(locale)
    }
}

/// Root data written for one locale.
#[derive(Debug, Clone, PartialEq)]
pub struct RootData {
    pub shared: Data,
    pub locale: Locale,
    pub localized: Data,
    pub status: Option<DocumentStatus>,
}

/// A stored snapshot of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRow {
    pub id: VersionId,
    pub collection: String,
    pub parent_id: DocumentId,
    pub status: DocumentStatus,
    pub locale: Locale,
    /// Fully assembled document data for `locale`.
    pub data: Data,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sort order of a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    /// Parses `field` or `-field` (descending).
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: raw.to_string(),
                descending: false,
            },
        }
    }
}

/// Filters and paging for list reads. Conditions are equality on data paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub conditions: Vec<(FieldPath, Value)>,
    /// Localized values of this locale take precedence over shared ones.
    pub locale: Option<Locale>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl FindQuery {
    #[must_use]
    pub fn with_condition(mut self, path: FieldPath, value: Value) -> Self {
        self.conditions.push((path, value));
        self
    }
}

/// Read access plus the entry point for writes.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StorageResult<Option<StoredDocument>>;

    async fn find(&self, collection: &str, query: &FindQuery) -> StorageResult<Vec<StoredDocument>>;

    /// Number of documents matching `query`, ignoring its paging.
    async fn count(&self, collection: &str, query: &FindQuery) -> StorageResult<usize>;

    /// All relation rows of a document, every locale included.
    async fn relations(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<RelationRecord>>;

    /// All block or tree rows of a document, every locale included.
    async fn rows(&self, table: RowTable, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<TreeBlock>>;

    async fn version(&self, collection: &str, id: VersionId) -> StorageResult<Option<VersionRow>>;

    /// Most recently updated version of a document in `locale`, optionally
    /// restricted to one status.
    async fn latest_version(
        &self,
        collection: &str,
        parent_id: DocumentId,
        locale: &Locale,
        status: Option<DocumentStatus>,
    ) -> StorageResult<Option<VersionRow>>;

    /// All versions of a document, newest first.
    async fn versions(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<VersionRow>>;

    /// Opens the transaction all writes of one operation go through.
    async fn begin(&self) -> StorageResult<Box<dyn Transaction>>;
}

/// An open write transaction.
///
/// Methods take `&self` so independent writes can be issued concurrently.
/// While a transaction is open, adapter reads must not observe its writes;
/// reads that need them go through the transaction.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Relation rows of a document as this transaction sees them.
    async fn relations(&self, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<RelationRecord>>;

    /// Block or tree rows of a document as this transaction sees them.
    async fn rows(&self, table: RowTable, collection: &str, parent_id: DocumentId) -> StorageResult<Vec<TreeBlock>>;

    /// Inserts a root row; fails if it already exists.
    async fn create_root(&self, collection: &str, id: DocumentId, root: &RootData) -> StorageResult<()>;

    /// Writes the shared data and one locale's data, inserting the root row
    /// if it does not exist yet.
    async fn update_root(&self, collection: &str, id: DocumentId, root: &RootData) -> StorageResult<()>;

    /// Removes a document with all of its locale, relation, block, tree and
    /// version rows. Returns false if there was nothing to delete.
    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> StorageResult<bool>;

    async fn create_relation(
        &self,
        collection: &str,
        parent_id: DocumentId,
        id: RowId,
        record: &RelationRecord,
    ) -> StorageResult<()>;

    async fn update_relation(&self, id: RowId, record: &RelationRecord) -> StorageResult<()>;

    async fn delete_relation(&self, id: RowId) -> StorageResult<()>;

    async fn create_row(
        &self,
        table: RowTable,
        collection: &str,
        parent_id: DocumentId,
        id: RowId,
        row: &TreeBlock,
    ) -> StorageResult<()>;

    async fn update_row(&self, table: RowTable, id: RowId, row: &TreeBlock) -> StorageResult<()>;

    async fn delete_row(&self, table: RowTable, id: RowId) -> StorageResult<()>;

    async fn insert_version(&self, version: &VersionRow) -> StorageResult<()>;

    async fn update_version(&self, id: VersionId, status: DocumentStatus, data: &Data) -> StorageResult<()>;

    /// Deletes all but the `keep` most recent versions of a document.
    async fn prune_versions(&self, collection: &str, parent_id: DocumentId, keep: usize) -> StorageResult<usize>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
