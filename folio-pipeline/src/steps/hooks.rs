use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::hooks::{Hook, HookPoint, HookRegistry};
use crate::step::Step;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the hooks registered for one point, in registration order.
pub struct RunHooks {
    point: HookPoint,
    hooks: Vec<Arc<dyn Hook>>,
}

impl RunHooks {
    pub fn new(point: HookPoint, registry: &HookRegistry) -> Self {
        Self {
            point,
            hooks: registry.get(point).to_vec(),
        }
    }
}

#[async_trait]
impl Step for RunHooks {
    fn name(&self) -> &'static str {
        match self.point {
            HookPoint::BeforeOperation => "hooks:beforeOperation",
            HookPoint::BeforeCreate => "hooks:beforeCreate",
            HookPoint::BeforeRead => "hooks:beforeRead",
            HookPoint::BeforeUpdate => "hooks:beforeUpdate",
            HookPoint::BeforeUpsert => "hooks:beforeUpsert",
            HookPoint::BeforeDelete => "hooks:beforeDelete",
            HookPoint::AfterCreate => "hooks:afterCreate",
            HookPoint::AfterUpdate => "hooks:afterUpdate",
            HookPoint::AfterDelete => "hooks:afterDelete",
        }
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        for hook in &self.hooks {
            ctx = hook.call(ctx).await.map_err(|e| PipelineError::Hook {
                point: self.point,
                message: e.to_string(),
            })?;
        }
        Ok(ctx)
    }
}
