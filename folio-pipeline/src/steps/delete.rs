use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::step::Step;
use async_trait::async_trait;
use tracing::info;

/// Deletes the document with every row that belongs to it. The original
/// becomes the result.
pub struct DeleteDocument;

#[async_trait]
impl Step for DeleteDocument {
    fn name(&self) -> &'static str {
        "delete_document"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let id = ctx.require_id()?;
        let deleted = ctx.transaction()?.delete_by_id(ctx.slug(), id).await?;
        if !deleted {
            return Err(PipelineError::NotFound(format!("{}/{}", ctx.slug(), id)));
        }
        info!("Deleted {}/{}", ctx.slug(), id);
        ctx.doc = ctx.original.clone();
        Ok(ctx)
    }
}
