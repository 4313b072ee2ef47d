use crate::access::{PruneRules, prune_fields};
use crate::context::OperationContext;
use crate::error::PipelineResult;
use crate::step::Step;
use async_trait::async_trait;
use folio_model::merge::{
    carry_over_structure, fallback_from_original, merge_with_blank, prune_unknown_blocks,
};
use folio_model::{FieldKind, Operation, build_config_map};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

fn strip_denied(ctx: &mut OperationContext, operation: Operation) {
    let rules = PruneRules {
        operation,
        actor: ctx.actor.as_ref(),
        id: ctx.params.id,
        hidden: false,
    };
    let removed = prune_fields(&ctx.collection.fields, &mut ctx.data, &rules);
    if removed > 0 {
        debug!("{}: dropped {} {}-denied values", ctx.collection.slug, removed, operation);
    }
}

/// Create: fills every field the caller left out with its default.
pub struct MergeWithBlank;

#[async_trait]
impl Step for MergeWithBlank {
    fn name(&self) -> &'static str {
        "merge_with_blank"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        strip_denied(&mut ctx, Operation::Create);
        ctx.data = merge_with_blank(&ctx.collection.fields, &ctx.data);
        Ok(ctx)
    }
}

/// Update: keeps stored values for everything the caller left empty.
///
/// Upload fields sent as an explicit `null` count as cleared, as do the
/// paths listed in the `clear` parameter.
pub struct MergeFallback;

#[async_trait]
impl Step for MergeFallback {
    fn name(&self) -> &'static str {
        "merge_fallback"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        strip_denied(&mut ctx, Operation::Update);
        let collection = Arc::clone(&ctx.collection);
        let fields = &collection.fields;

        let Some(original) = ctx.original.as_ref() else {
            ctx.data = merge_with_blank(fields, &ctx.data);
            ctx.config_map = Some(build_config_map(&ctx.data, fields));
            return Ok(ctx);
        };

        let mut ignore = ctx.params.clear.clone();
        let incoming_map = ctx
            .config_map
            .take()
            .unwrap_or_else(|| build_config_map(&ctx.data, fields));
        for (path, field) in incoming_map.iter() {
            if matches!(field.kind, FieldKind::Upload { .. })
                && path.lookup(&ctx.data) == Some(&Value::Null)
            {
                ignore.push(path.clone());
            }
        }

        let carried = carry_over_structure(fields, &mut ctx.data, &original.data, &ignore);
        prune_unknown_blocks(fields, &mut ctx.data);
        let map = build_config_map(&ctx.data, fields);
        let original_map = ctx
            .original_config_map
            .take()
            .unwrap_or_else(|| build_config_map(&original.data, fields));
        let restored =
            fallback_from_original(&map, &original_map, &mut ctx.data, &original.data, &ignore);
        debug!(
            "{}: carried over {} lists, restored {} values from original",
            collection.slug, carried, restored
        );

        ctx.config_map = Some(map);
        ctx.original_config_map = Some(original_map);
        Ok(ctx)
    }
}
