//! Document model for Folio.
//!
//! Defines the schema and document types every other crate depends on:
//! - [`Field`] / [`FieldKind`]: the closed set of scalar and structural field kinds
//! - [`CollectionConfig`]: a collection or area definition with versioning,
//!   upload and access settings
//! - [`Document`]: the data container returned by the pipeline
//! - [`ConfigMap`]: path-indexed field lookup for one data instance
//! - [`split_document`] / [`assemble_document`]: conversion between a
//!   document and its root, block, tree and relation rows
//! - merge helpers for create (blank document) and update (fallback)
//! - [`resolve_version_operation`]: the versioning transition of an update

mod access;
mod collection;
mod config_map;
mod document;
mod field;
pub mod merge;
mod path;
mod rows;
mod version;

pub use access::{Access, AccessArgs};
pub use collection::{
    CollectionConfig, CollectionKind, Operation, OperationAccess, UPLOAD_FIELDS, UploadConfig,
    VersionsConfig,
};
pub use config_map::{BLOCK_TYPE_KEY, CHILDREN_KEY, ConfigMap, build_config_map};
pub use document::{Document, DocumentStatus};
pub use field::{
    BlockSchema, EmptyPredicate, Field, FieldAccess, FieldKind, RelationShape, Tab,
    ValidationArgs, Validator, find_block,
};
pub use path::{FieldPath, PathSegment};
pub use rows::{
    BlockIdent, ID_KEY, IncomingRelation, RELATION_TO_KEY, RELATION_VALUE_KEY, RelationRecord,
    SplitDocument, TreeBlock, assemble_document, split_document,
};
pub use version::{VersionOperation, VersionResolveError, resolve_version_operation};

/// The JSON object holding a document's field values.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// Errors raised while interpreting document data against a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid field path: '{0}'")]
    InvalidPath(String),

    #[error("invalid relation at {path}: {reason}")]
    InvalidRelation { path: String, reason: String },
}
