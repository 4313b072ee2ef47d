//! The standard pipeline steps.
//!
//! Steps ahead of [`BeginTransaction`] only read; every write happens between
//! it and [`CommitTransaction`].

mod authorize;
mod config_map;
mod delete;
mod fetch;
mod hooks;
mod merge;
mod original;
mod persist;
mod populate;
mod transaction;
mod transform;
mod upload;
mod validate;
mod version;

pub use authorize::Authorize;
pub use config_map::BuildConfigMaps;
pub use delete::DeleteDocument;
pub use fetch::{FetchDocument, FindDocuments, Refetch};
pub use hooks::RunHooks;
pub use merge::{MergeFallback, MergeWithBlank};
pub use original::FetchOriginal;
pub use persist::{PersistRelations, PersistRoot, PersistRows, PersistVersion};
pub use populate::{Collections, PopulateRelations};
pub use transaction::{BeginTransaction, CommitTransaction};
pub use transform::Transform;
pub use upload::{RemoveFiles, StagedUpload, StoreUpload};
pub use validate::Validate;
pub use version::ResolveVersion;
