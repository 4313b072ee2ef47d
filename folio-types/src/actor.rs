use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The authenticated principal an operation runs on behalf of.
///
/// Identity issuance happens outside the core; the request boundary hands
/// over an already-authenticated actor (or none for anonymous requests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            roles: BTreeSet::new(),
        }
    }

    /// Adds a role, builder style.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
