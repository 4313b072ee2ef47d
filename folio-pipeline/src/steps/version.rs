use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::step::Step;
use async_trait::async_trait;
use folio_model::resolve_version_operation;
use tracing::debug;

/// Picks the versioning transition of an update.
pub struct ResolveVersion;

#[async_trait]
impl Step for ResolveVersion {
    fn name(&self) -> &'static str {
        "resolve_version"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let transition = resolve_version_operation(
            ctx.params.draft,
            ctx.params.version_id,
            ctx.collection.versions.as_ref(),
        )
        .map_err(|e| PipelineError::Operation(format!("{}: {}", ctx.slug(), e)))?;
        debug!("{}: version transition {}", ctx.slug(), transition);
        ctx.version_operation = Some(transition);
        Ok(ctx)
    }
}
