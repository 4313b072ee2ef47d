use crate::access::Access;
use crate::field::Field;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four document operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Whether a schema describes a list of documents or a singleton.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    Collection,
    Area,
}

/// Versioning settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsConfig {
    /// Allow saving drafts next to the published document.
    #[serde(default)]
    pub drafts: bool,
    /// Keep at most this many version rows per document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_doc: Option<u32>,
}

/// Marks a collection as an upload collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Accepted MIME types; `image/*` style wildcards allowed. Empty accepts all.
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl UploadConfig {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.mime_types.is_empty()
            || self.mime_types.iter().any(|allowed| match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .is_some_and(|(major, _)| major == prefix),
                None => allowed == mime_type,
            })
    }
}

/// Collection-level access predicates. `None` means "any authenticated actor".
#[derive(Debug, Clone, Default)]
pub struct OperationAccess {
    pub create: Option<Access>,
    pub read: Option<Access>,
    pub update: Option<Access>,
    pub delete: Option<Access>,
}

impl OperationAccess {
    pub fn for_operation(&self, operation: Operation) -> Option<&Access> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        }
    }
}

/// Upload metadata fields added to every upload collection.
pub const UPLOAD_FIELDS: [&str; 5] = ["filename", "mimeType", "filesize", "url", "thumbnailUrl"];

/// A collection or area definition.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub slug: String,
    pub kind: CollectionKind,
    pub fields: Vec<Field>,
    pub versions: Option<VersionsConfig>,
    pub upload: Option<UploadConfig>,
    pub access: OperationAccess,
    /// Field whose value becomes the document's `_title`.
    pub use_as_title: Option<String>,
}

impl CollectionConfig {
    pub fn collection(slug: &str, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            kind: CollectionKind::Collection,
            fields,
            versions: None,
            upload: None,
            access: OperationAccess::default(),
            use_as_title: None,
        }
    }

    pub fn area(slug: &str, fields: Vec<Field>) -> Self {
        Self {
            kind: CollectionKind::Area,
            ..Self::collection(slug, fields)
        }
    }

    #[must_use]
    pub fn with_versions(mut self, versions: VersionsConfig) -> Self {
        self.versions = Some(versions);
        self
    }

    /// Shorthand for versioning with drafts enabled.
    #[must_use]
    pub fn with_drafts(self) -> Self {
        self.with_versions(VersionsConfig {
            drafts: true,
            max_per_doc: None,
        })
    }

    /// Turns the collection into an upload collection and appends the file
    /// metadata fields.
    #[must_use]
    pub fn with_upload(mut self, upload: UploadConfig) -> Self {
        for name in UPLOAD_FIELDS {
            if self.field(name).is_none() {
                let field = if name == "filesize" {
                    Field::number(name)
                } else {
                    Field::text(name)
                };
                self.fields.push(field);
            }
        }
        self.upload = Some(upload);
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: OperationAccess) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn use_as_title(mut self, field: &str) -> Self {
        self.use_as_title = Some(field.into());
        self
    }

    pub fn is_area(&self) -> bool {
        self.kind == CollectionKind::Area
    }

    pub fn has_drafts(&self) -> bool {
        self.versions.as_ref().is_some_and(|v| v.drafts)
    }

    /// Top-level field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
