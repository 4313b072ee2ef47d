use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::step::Step;
use async_trait::async_trait;
use folio_model::{Operation, UPLOAD_FIELDS};
use folio_storage::FileStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// A file stored by a run that has not committed yet.
///
/// Dropping it without [`StagedUpload::keep`] removes the file again, so a
/// failure after the upload step leaves no orphan behind.
pub struct StagedUpload {
    files: Arc<dyn FileStore>,
    filename: Option<String>,
}

impl StagedUpload {
    fn new(files: Arc<dyn FileStore>, filename: String) -> Self {
        Self {
            files,
            filename: Some(filename),
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Keeps the file for good. Called once the run's writes are committed.
    pub fn keep(mut self) {
        self.filename = None;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        let Some(filename) = self.filename.take() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            warn!("Orphaned upload {}: no runtime to remove it on", filename);
            return;
        };
        warn!("Operation failed after storing {}; removing it", filename);
        let files = Arc::clone(&self.files);
        runtime.spawn(async move {
            if let Err(e) = files.remove(&filename).await {
                warn!("Failed to remove orphaned upload {}: {}", filename, e);
            }
        });
    }
}

/// Hands the upload payload to the file store and records where it went in
/// the document's file fields. The file stays staged until commit.
pub struct StoreUpload {
    files: Arc<dyn FileStore>,
}

impl StoreUpload {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Step for StoreUpload {
    fn name(&self) -> &'static str {
        "store_upload"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let Some(upload) = ctx.upload.as_ref() else {
            return Ok(ctx);
        };
        let stored = self
            .files
            .store(upload)
            .await
            .map_err(|e| PipelineError::File(e.to_string()))?;
        info!("Stored {} ({} bytes) for {}", stored.filename, stored.filesize, ctx.slug());
        let staged = StagedUpload::new(Arc::clone(&self.files), stored.filename.clone());

        let mut fields = match serde_json::to_value(&stored) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                return Err(PipelineError::File(
                    "stored file did not serialize to an object".into(),
                ));
            }
            Err(e) => return Err(PipelineError::File(e.to_string())),
        };
        for name in UPLOAD_FIELDS {
            let value = fields.remove(name).unwrap_or(Value::Null);
            ctx.data.insert(name.to_string(), value);
        }
        ctx.stored_file = Some(stored);
        ctx.staged_upload = Some(staged);
        Ok(ctx)
    }
}

/// Removes files the committed operation no longer references: the file of
/// a deleted document, or the one an update replaced.
///
/// Runs after commit, so failures are logged and do not fail the operation.
pub struct RemoveFiles {
    files: Arc<dyn FileStore>,
}

impl RemoveFiles {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Step for RemoveFiles {
    fn name(&self) -> &'static str {
        "remove_files"
    }

    async fn run(&self, ctx: OperationContext) -> PipelineResult<OperationContext> {
        if ctx.collection.upload.is_none() {
            return Ok(ctx);
        }
        let previous = ctx
            .original
            .as_ref()
            .and_then(|original| original.get_str("filename"));
        let stale = match (ctx.operation, previous, &ctx.stored_file) {
            (Operation::Delete, Some(filename), _) => Some(filename),
            (Operation::Update, Some(filename), Some(stored)) if stored.filename != filename => {
                Some(filename)
            }
            _ => None,
        };
        if let Some(filename) = stale {
            match self.files.remove(filename).await {
                Ok(()) => info!("Removed {} from {}", filename, ctx.slug()),
                Err(e) => warn!("Failed to remove {} from {}: {}", filename, ctx.slug(), e),
            }
        }
        Ok(ctx)
    }
}
