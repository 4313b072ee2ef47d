//! The step abstraction and the ordered pipeline that folds over it.

use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use tracing::{debug, error};

/// One unit of work. Consumes the context and hands back the next version.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: OperationContext) -> PipelineResult<OperationContext>;
}

/// An ordered list of steps run one after another.
///
/// The first failing step ends the run. The context, and with it any open
/// transaction, is dropped on the way out, which rolls the transaction back.
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        for step in &self.steps {
            debug!("{}: {}", self.name, step.name());
            ctx = match step.run(ctx).await {
                Ok(next) => next,
                Err(e) => {
                    match &e {
                        PipelineError::Operation(_) => {
                            error!("{}: step {} failed: {}", self.name, step.name(), e);
                        }
                        _ => debug!("{}: step {} stopped the run: {}", self.name, step.name(), e),
                    }
                    return Err(e);
                }
            };
        }
        Ok(ctx)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}
