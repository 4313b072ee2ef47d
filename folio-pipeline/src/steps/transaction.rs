use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::step::Step;
use async_trait::async_trait;
use folio_storage::StorageAdapter;
use std::sync::Arc;
use tracing::debug;

/// Opens the transaction every following write goes through.
pub struct BeginTransaction {
    storage: Arc<dyn StorageAdapter>,
}

impl BeginTransaction {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Step for BeginTransaction {
    fn name(&self) -> &'static str {
        "begin_transaction"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        if ctx.transaction.is_some() {
            return Err(PipelineError::Operation("transaction already open".into()));
        }
        ctx.transaction = Some(self.storage.begin().await?);
        debug!("{}: transaction open", ctx.slug());
        Ok(ctx)
    }
}

pub struct CommitTransaction;

#[async_trait]
impl Step for CommitTransaction {
    fn name(&self) -> &'static str {
        "commit_transaction"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let tx = ctx
            .transaction
            .take()
            .ok_or_else(|| PipelineError::Operation("no open transaction".into()))?;
        tx.commit().await?;
        if let Some(staged) = ctx.staged_upload.take() {
            staged.keep();
        }
        debug!("{}: committed {} on {:?}", ctx.slug(), ctx.operation, ctx.params.id);
        Ok(ctx)
    }
}
