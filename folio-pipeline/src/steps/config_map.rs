use crate::context::OperationContext;
use crate::error::PipelineResult;
use crate::step::Step;
use async_trait::async_trait;
use folio_model::build_config_map;

/// Maps the incoming data, and the original when there is one.
pub struct BuildConfigMaps;

#[async_trait]
impl Step for BuildConfigMaps {
    fn name(&self) -> &'static str {
        "build_config_maps"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let fields = &ctx.collection.fields;
        ctx.config_map = Some(build_config_map(&ctx.data, fields));
        ctx.original_config_map = ctx
            .original
            .as_ref()
            .map(|original| build_config_map(&original.data, fields));
        Ok(ctx)
    }
}
