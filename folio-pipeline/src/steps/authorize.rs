use crate::access::ensure_allowed;
use crate::context::OperationContext;
use crate::error::PipelineResult;
use crate::step::Step;
use async_trait::async_trait;

/// Checks the collection-level predicate of the running operation.
pub struct Authorize;

#[async_trait]
impl Step for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    async fn run(&self, ctx: OperationContext) -> PipelineResult<OperationContext> {
        ensure_allowed(&ctx.collection, ctx.operation, ctx.actor.as_ref(), ctx.params.id)?;
        Ok(ctx)
    }
}
