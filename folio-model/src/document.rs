use crate::collection::CollectionKind;
use crate::path::FieldPath;
use crate::Data;
use chrono::{DateTime, Utc};
use folio_types::{DocumentId, Locale, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Publication state of a versioned document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Published,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DocumentStatus::Draft),
            "published" => Some(DocumentStatus::Published),
            _ => None,
        }
    }
}

/// A document as returned by the pipeline.
///
/// `data` holds the user-defined fields. System fields sit next to it and
/// serialize with their reserved names (`_title`, `_thumbnail`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    #[serde(rename = "_prototype")]
    pub collection: String,
    #[serde(rename = "_type")]
    pub kind: CollectionKind,
    #[serde(flatten)]
    pub data: Data,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<VersionId>,
    #[serde(rename = "_title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "_thumbnail", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Document {
    /// Value at a dotted path (e.g. `"meta.title"` or `"content.0.body"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.parse::<FieldPath>().ok()?.lookup(&self.data)
    }

    /// Extract a string value at a dotted path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Extract a numeric value at a dotted path.
    pub fn get_number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(|v| v.as_f64())
    }

    /// Extract a boolean value at a dotted path.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    /// Serializes the document, system fields included, into one JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
