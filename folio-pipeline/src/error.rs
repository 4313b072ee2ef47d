//! Error types for the operation pipeline.

use crate::hooks::HookPoint;
use folio_model::{ModelError, Operation};
use folio_storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One failed check on one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted data path, or the query parameter name for request errors.
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Every field error collected by one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// First error reported for `path`.
    pub fn for_path(&self, path: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.path == path)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> PipelineResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.path, error.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not allowed to {operation} in '{collection}'")]
    Unauthorized {
        operation: Operation,
        collection: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A step ran against a context it cannot handle; a wiring defect.
    #[error("operation error: {0}")]
    Operation(String),

    #[error("{point} hook failed: {message}")]
    Hook { point: HookPoint, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("file error: {0}")]
    File(String),
}

impl PipelineError {
    /// True for outcomes a caller is expected to hit (bad input, missing
    /// documents, denied access, hook rejections) as opposed to defects.
    pub fn is_user_facing(&self) -> bool {
        match self {
            PipelineError::Unauthorized { .. }
            | PipelineError::NotFound(_)
            | PipelineError::Validation(_)
            | PipelineError::Hook { .. } => true,
            PipelineError::Storage(StorageError::NotFound(_)) => true,
            PipelineError::Operation(_) | PipelineError::Storage(_) | PipelineError::File(_) => {
                false
            }
        }
    }

    pub(crate) fn field(path: impl fmt::Display, message: impl Into<String>) -> Self {
        PipelineError::Validation(ValidationErrors(vec![FieldError::new(path, message)]))
    }
}

impl From<ModelError> for PipelineError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::InvalidRelation { path, reason } => PipelineError::field(path, reason),
            ModelError::InvalidPath(path) => PipelineError::field(path, "invalid field path"),
        }
    }
}
