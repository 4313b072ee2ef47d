use serde::{Deserialize, Serialize};
use std::fmt;

/// A content locale code such as `en` or `de-CH`.
///
/// Locales are compared verbatim; normalisation (case, region aliases) is the
/// request boundary's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locale {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for Locale {
    fn from(code: String) -> Self {
        Self(code)
    }
}
