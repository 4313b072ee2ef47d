//! User hooks and the registry they are wired through.
//!
//! A hook receives the whole [`OperationContext`] and returns it, possibly
//! modified. Returning an error aborts the pipeline with
//! [`PipelineError::Hook`](crate::PipelineError::Hook).

use crate::context::OperationContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Points in a pipeline where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeOperation,
    BeforeCreate,
    BeforeRead,
    BeforeUpdate,
    /// Areas only; runs ahead of `BeforeUpdate`.
    BeforeUpsert,
    BeforeDelete,
    AfterCreate,
    AfterUpdate,
    AfterDelete,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeOperation => "beforeOperation",
            HookPoint::BeforeCreate => "beforeCreate",
            HookPoint::BeforeRead => "beforeRead",
            HookPoint::BeforeUpdate => "beforeUpdate",
            HookPoint::BeforeUpsert => "beforeUpsert",
            HookPoint::BeforeDelete => "beforeDelete",
            HookPoint::AfterCreate => "afterCreate",
            HookPoint::AfterUpdate => "afterUpdate",
            HookPoint::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied hook.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: OperationContext) -> anyhow::Result<OperationContext>;
}

/// Adapts an async closure into a [`Hook`].
pub struct FnHook<F>(F);

/// Wraps `f` as a hook:
///
/// ```ignore
/// hooks.register(HookPoint::BeforeCreate, hook_fn(|mut ctx: OperationContext| async move {
///     ctx.data.insert("slug".into(), "generated".into());
///     Ok(ctx)
/// }));
/// ```
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(OperationContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<OperationContext>> + Send,
{
    FnHook(f)
}

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(OperationContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<OperationContext>> + Send,
{
    async fn call(&self, ctx: OperationContext) -> anyhow::Result<OperationContext> {
        (self.0)(ctx).await
    }
}

/// Hooks of one collection, kept in registration order per point.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookPoint, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hook` to the hooks of `point`.
    pub fn register(&mut self, point: HookPoint, hook: impl Hook + 'static) -> &mut Self {
        self.hooks.entry(point).or_default().push(Arc::new(hook));
        self
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, point: HookPoint, hook: impl Hook + 'static) -> Self {
        self.register(point, hook);
        self
    }

    pub fn get(&self, point: HookPoint) -> &[Arc<dyn Hook>] {
        self.hooks.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(HookPoint, usize)> =
            self.hooks.iter().map(|(point, hooks)| (*point, hooks.len())).collect();
        counts.sort_by_key(|(point, _)| point.as_str());
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}
