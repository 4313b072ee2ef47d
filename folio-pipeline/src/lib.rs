//! The document operation pipeline of Folio.
//!
//! Every create, read, update and delete runs as an ordered [`Pipeline`] of
//! [`Step`]s folding over one [`OperationContext`]:
//! - [`steps`]: authorization, merge and fallback, validation, persistence
//!   through the structural diffs, versioning, population and shaping
//! - [`hooks`]: user hooks at fixed points, registered per collection
//! - [`access`]: collection and field access predicates
//! - [`DocumentService`]: builds the pipelines of each collection and is the
//!   entry point for callers
//!
//! Writes go through one storage transaction held in the context. A failing
//! step drops the context, which rolls the transaction back.

pub mod access;
mod config;
mod context;
mod error;
pub mod hooks;
mod loader;
mod query;
mod service;
mod step;
pub mod steps;

pub use config::ServiceConfig;
pub use context::{Diffs, OperationContext, Params};
pub use error::{FieldError, PipelineError, PipelineResult, ValidationErrors};
pub use hooks::{Hook, HookPoint, HookRegistry, hook_fn};
pub use loader::{DocumentLoader, ReadLocale, ReadSource};
pub use query::{QueryParams, RequestContext};
pub use service::{DocumentService, DocumentServiceBuilder, PaginatedDocs};
pub use step::{Pipeline, Step};
