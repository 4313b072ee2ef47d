//! Core type definitions for Folio.
//!
//! This crate defines the fundamental, schema-agnostic types shared by every
//! other crate in the workspace:
//! - Document, version and row identifiers (UUID v7)
//! - Content locales
//! - The authenticated actor an operation runs for
//!
//! Field trees, documents and row records live in `folio-model`, not here.

mod actor;
mod ids;
mod locale;

pub use actor::Actor;
pub use ids::{DocumentId, RowId, VersionId};
pub use locale::Locale;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid locale: {0}")]
    InvalidLocale(String),
}

/// Parses a locale code, rejecting empty and whitespace-bearing input.
pub fn parse_locale(code: &str) -> Result<Locale> {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(Error::InvalidLocale(code.to_string()));
    }
    Ok(Locale::new(trimmed))
}
