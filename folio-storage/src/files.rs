//! File storage for upload collections.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A binary payload attached to a create or update of an upload collection.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Where a stored upload ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub filename: String,
    pub mime_type: String,
    pub filesize: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores the payload under a unique filename derived from the upload's.
    async fn store(&self, upload: &Upload) -> StorageResult<StoredFile>;

    async fn remove(&self, filename: &str) -> StorageResult<()>;
}

/// Keeps uploads in memory. Filenames are made unique with a numeric suffix.
pub struct MemoryFileStore {
    base_url: String,
    files: RwLock<HashMap<String, Upload>>,
}

impl MemoryFileStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, filename: &str) -> Option<Upload> {
        self.files.read().await.get(filename).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new("/media")
    }
}

fn unique_name(taken: &HashMap<String, Upload>, filename: &str) -> String {
    if !taken.contains_key(filename) {
        return filename.to_string();
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        })
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| filename.to_string())
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn store(&self, upload: &Upload) -> StorageResult<StoredFile> {
        if upload.filename.is_empty() || upload.filename.contains('/') {
            return Err(StorageError::InvalidData(format!(
                "invalid upload filename '{}'",
                upload.filename
            )));
        }
        let mut files = self.files.write().await;
        let filename = unique_name(&files, &upload.filename);
        let stored = StoredFile {
            url: format!("{}/{}", self.base_url, filename),
            thumbnail_url: upload
                .is_image()
                .then(|| format!("{}/thumbnails/{}", self.base_url, filename)),
            filesize: upload.bytes.len() as u64,
            mime_type: upload.mime_type.clone(),
            filename: filename.clone(),
        };
        files.insert(filename, upload.clone());
        debug!("Stored upload '{}' ({} bytes)", stored.filename, stored.filesize);
        Ok(stored)
    }

    async fn remove(&self, filename: &str) -> StorageResult<()> {
        match self.files.write().await.remove(filename) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!("file {filename}"))),
        }
    }
}
