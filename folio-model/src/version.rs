//! Selection of the versioning transition an update performs.

use crate::collection::VersionsConfig;
use crate::document::DocumentStatus;
use folio_types::VersionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five ways an update can treat versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionOperation {
    /// Versioning disabled: overwrite the document.
    Update,
    /// Drafts enabled, publishing: overwrite the document and record a
    /// published version.
    UpdatePublished,
    /// Rewrite the addressed version row in place.
    UpdateVersion,
    /// Versioning without drafts: overwrite the document and record a version.
    NewVersionFromLatest,
    /// Drafts enabled, saving a draft: leave the published document alone and
    /// record a draft version.
    NewDraftFromPublished,
}

impl VersionOperation {
    /// True when the main document tables (root, blocks, tree, relations) are
    /// written. Draft transitions only touch version rows.
    pub fn writes_main_document(self) -> bool {
        !matches!(
            self,
            VersionOperation::UpdateVersion | VersionOperation::NewDraftFromPublished
        )
    }

    /// True when a new version row is inserted.
    pub fn inserts_version(self) -> bool {
        matches!(
            self,
            VersionOperation::UpdatePublished
                | VersionOperation::NewVersionFromLatest
                | VersionOperation::NewDraftFromPublished
        )
    }

    /// True when the original document is read from the addressed version
    /// row rather than from the main document.
    pub fn reads_version(self) -> bool {
        self == VersionOperation::UpdateVersion
    }

    /// Status recorded on a newly inserted version row.
    pub fn version_status(self) -> Option<DocumentStatus> {
        match self {
            VersionOperation::NewDraftFromPublished => Some(DocumentStatus::Draft),
            VersionOperation::UpdatePublished | VersionOperation::NewVersionFromLatest => {
                Some(DocumentStatus::Published)
            }
            VersionOperation::Update | VersionOperation::UpdateVersion => None,
        }
    }

    /// True for transitions that save drafts; required-field checks are
    /// relaxed for them.
    pub fn is_draft_save(self) -> bool {
        matches!(
            self,
            VersionOperation::NewDraftFromPublished | VersionOperation::UpdateVersion
        )
    }
}

impl fmt::Display for VersionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionOperation::Update => "UPDATE",
            VersionOperation::UpdatePublished => "UPDATE_PUBLISHED",
            VersionOperation::UpdateVersion => "UPDATE_VERSION",
            VersionOperation::NewVersionFromLatest => "NEW_VERSION_FROM_LATEST",
            VersionOperation::NewDraftFromPublished => "NEW_DRAFT_FROM_PUBLISHED",
        })
    }
}

/// Combinations that a correctly wired request can never produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionResolveError {
    #[error("drafts are enabled but no draft flag was supplied")]
    MissingDraftFlag,
}

/// Picks the transition for an update.
///
/// An explicit version id always wins over the draft flag. With drafts
/// enabled the flag must be present; its absence is a wiring error, not a
/// reason to guess.
pub fn resolve_version_operation(
    draft: Option<bool>,
    version_id: Option<VersionId>,
    versions: Option<&VersionsConfig>,
) -> Result<VersionOperation, VersionResolveError> {
    let Some(versions) = versions else {
        return Ok(VersionOperation::Update);
    };
    if version_id.is_some() {
        return Ok(VersionOperation::UpdateVersion);
    }
    if !versions.drafts {
        return Ok(VersionOperation::NewVersionFromLatest);
    }
    match draft {
        Some(true) => Ok(VersionOperation::NewDraftFromPublished),
        Some(false) => Ok(VersionOperation::UpdatePublished),
        None => Err(VersionResolveError::MissingDraftFlag),
    }
}
