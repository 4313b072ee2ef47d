//! The state threaded through every step of a pipeline run.

use crate::error::{PipelineError, PipelineResult};
use crate::steps::StagedUpload;
use folio_diff::{RelationDiff, TreeDiff};
use folio_model::{
    CollectionConfig, ConfigMap, Data, Document, FieldPath, Operation, SplitDocument,
    VersionOperation,
};
use folio_storage::{FindQuery, StoredFile, Transaction, Upload};
use folio_types::{Actor, DocumentId, Locale, VersionId};
use std::fmt;
use std::sync::Arc;

/// Request parameters after normalisation at the boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    /// The addressed document. Assigned by the root-persist step on create.
    pub id: Option<DocumentId>,
    /// Top-level projection of returned documents.
    pub select: Option<Vec<FieldPath>>,
    pub draft: Option<bool>,
    pub version_id: Option<VersionId>,
    /// How many levels of relations to populate.
    pub depth: usize,
    /// Filters and paging of list reads.
    pub query: FindQuery,
    /// Paths the caller cleared on purpose; fallback leaves them empty.
    pub clear: Vec<FieldPath>,
}

/// Diffs computed by the persistence steps, kept for hooks and tests.
#[derive(Debug, Clone, Default)]
pub struct Diffs {
    pub blocks: Option<TreeDiff>,
    pub tree: Option<TreeDiff>,
    pub relations: Option<RelationDiff>,
}

pub struct OperationContext {
    pub operation: Operation,
    pub collection: Arc<CollectionConfig>,
    pub locale: Locale,
    /// Locale read when a document has no data in `locale`.
    pub fallback_locale: Option<Locale>,
    pub actor: Option<Actor>,
    pub params: Params,
    /// Incoming data on writes.
    pub data: Data,
    pub upload: Option<Upload>,
    /// The stored document an update or delete starts from.
    pub original: Option<Document>,
    pub config_map: Option<ConfigMap>,
    pub original_config_map: Option<ConfigMap>,
    pub version_operation: Option<VersionOperation>,
    /// `data` split into root data and rows by the root-persist step.
    pub rows: Option<SplitDocument>,
    pub diffs: Diffs,
    pub stored_file: Option<StoredFile>,
    /// Removes the stored file if the run ends before commit.
    pub staged_upload: Option<StagedUpload>,
    /// Single-document result.
    pub doc: Option<Document>,
    /// List result.
    pub docs: Vec<Document>,
    /// Total matches of a list read, ignoring paging.
    pub total: usize,
    pub transaction: Option<Box<dyn Transaction>>,
}

impl OperationContext {
    pub fn new(
        operation: Operation,
        collection: Arc<CollectionConfig>,
        locale: Locale,
        actor: Option<Actor>,
    ) -> Self {
        Self {
            operation,
            collection,
            locale,
            fallback_locale: None,
            actor,
            params: Params::default(),
            data: Data::new(),
            upload: None,
            original: None,
            config_map: None,
            original_config_map: None,
            version_operation: None,
            rows: None,
            diffs: Diffs::default(),
            stored_file: None,
            staged_upload: None,
            doc: None,
            docs: Vec::new(),
            total: 0,
            transaction: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_upload(mut self, upload: Option<Upload>) -> Self {
        self.upload = upload;
        self
    }

    #[must_use]
    pub fn with_fallback_locale(mut self, locale: Option<Locale>) -> Self {
        self.fallback_locale = locale;
        self
    }

    pub fn slug(&self) -> &str {
        &self.collection.slug
    }

    pub fn require_id(&self) -> PipelineResult<DocumentId> {
        self.params.id.ok_or_else(|| {
            PipelineError::Operation(format!(
                "{} on '{}' without a document id",
                self.operation,
                self.slug()
            ))
        })
    }

    pub fn require_original(&self) -> PipelineResult<&Document> {
        self.original
            .as_ref()
            .ok_or_else(|| PipelineError::Operation("original document was not fetched".into()))
    }

    pub fn transaction(&self) -> PipelineResult<&dyn Transaction> {
        self.transaction
            .as_deref()
            .ok_or_else(|| PipelineError::Operation("no open transaction".into()))
    }

    /// True unless the versioning transition only touches version rows.
    pub fn writes_main_document(&self) -> bool {
        self.version_operation
            .is_none_or(VersionOperation::writes_main_document)
    }

    /// True when this run saves a draft; required checks are skipped.
    pub fn is_draft_save(&self) -> bool {
        match self.operation {
            Operation::Create => self.collection.has_drafts() && self.params.draft == Some(true),
            _ => self.version_operation.is_some_and(VersionOperation::is_draft_save),
        }
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("operation", &self.operation)
            .field("collection", &self.collection.slug)
            .field("locale", &self.locale)
            .field("actor", &self.actor.as_ref().map(|a| a.id.as_str()))
            .field("params", &self.params)
            .field("version_operation", &self.version_operation)
            .field("has_original", &self.original.is_some())
            .field("has_upload", &self.upload.is_some())
            .field("docs", &self.docs.len())
            .field("transaction_open", &self.transaction.is_some())
            .finish_non_exhaustive()
    }
}
