//! Loads stored documents back into [`Document`]s.

use crate::error::{PipelineError, PipelineResult};
use folio_model::{CollectionConfig, Document, DocumentStatus, assemble_document};
use folio_storage::{RowTable, StorageAdapter, StoredDocument, VersionRow};
use folio_types::{DocumentId, Locale, VersionId};
use std::sync::Arc;
use tracing::debug;

/// Where a read takes its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// The main document tables.
    Main,
    /// The newest draft when one is newer than the main document, else the
    /// main document.
    Latest,
    /// One addressed version row.
    Version(VersionId),
}

impl ReadSource {
    pub fn for_request(draft: Option<bool>, version_id: Option<VersionId>) -> Self {
        match (version_id, draft) {
            (Some(id), _) => ReadSource::Version(id),
            (None, Some(true)) => ReadSource::Latest,
            _ => ReadSource::Main,
        }
    }
}

/// Locale a read asks for, plus the one used when the document has no data
/// in it.
#[derive(Debug, Clone, Copy)]
pub struct ReadLocale<'a> {
    pub locale: &'a Locale,
    pub fallback: Option<&'a Locale>,
}

#[derive(Clone)]
pub struct DocumentLoader {
    storage: Arc<dyn StorageAdapter>,
}

impl DocumentLoader {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub async fn load(
        &self,
        collection: &CollectionConfig,
        id: DocumentId,
        locale: ReadLocale<'_>,
        source: ReadSource,
    ) -> PipelineResult<Option<Document>> {
        match self.storage.find_by_id(&collection.slug, id).await? {
            Some(stored) => self.from_stored(collection, stored, locale, source).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn from_stored(
        &self,
        collection: &CollectionConfig,
        stored: StoredDocument,
        locale: ReadLocale<'_>,
        source: ReadSource,
    ) -> PipelineResult<Document> {
        match source {
            ReadSource::Version(version_id) => {
                let version = self
                    .storage
                    .version(&collection.slug, version_id)
                    .await?
                    .filter(|v| v.parent_id == stored.id)
                    .ok_or_else(|| {
                        PipelineError::NotFound(format!(
                            "version {} of {}/{}",
                            version_id, collection.slug, stored.id
                        ))
                    })?;
                return Ok(version_document(collection, &stored, version, locale.locale));
            }
            ReadSource::Latest if collection.has_drafts() => {
                if let Some(draft) = self.newest_draft(collection, &stored, locale).await? {
                    debug!("Reading draft {} of {}/{}", draft.id, collection.slug, stored.id);
                    return Ok(version_document(collection, &stored, draft, locale.locale));
                }
            }
            _ => {}
        }
        self.assemble(collection, stored, locale).await
    }

    async fn newest_draft(
        &self,
        collection: &CollectionConfig,
        stored: &StoredDocument,
        locale: ReadLocale<'_>,
    ) -> PipelineResult<Option<VersionRow>> {
        let candidates = std::iter::once(locale.locale)
            .chain(locale.fallback.filter(|fallback| *fallback != locale.locale));
        for candidate in candidates {
            let latest = self
                .storage
                .latest_version(&collection.slug, stored.id, candidate, None)
                .await?;
            if let Some(version) = latest {
                let newer = version.status == DocumentStatus::Draft
                    && version.updated_at >= stored.updated_at;
                return Ok(newer.then_some(version));
            }
        }
        Ok(None)
    }

    async fn assemble(
        &self,
        collection: &CollectionConfig,
        stored: StoredDocument,
        locale: ReadLocale<'_>,
    ) -> PipelineResult<Document> {
        let slug = collection.slug.as_str();
        let effective = if stored.has_locale(locale.locale) {
            locale.locale
        } else {
            locale
                .fallback
                .filter(|fallback| stored.has_locale(fallback))
                .unwrap_or(locale.locale)
        };

        let (relations, blocks, tree) = futures::try_join!(
            self.storage.relations(slug, stored.id),
            self.storage.rows(RowTable::Blocks, slug, stored.id),
            self.storage.rows(RowTable::Tree, slug, stored.id),
        )?;
        let in_scope = |row_locale: Option<&Locale>| row_locale.is_none_or(|l| l == effective);
        let relations: Vec<_> = relations
            .into_iter()
            .filter(|r| in_scope(r.locale.as_ref()))
            .collect();
        let blocks: Vec<_> = blocks.into_iter().filter(|r| in_scope(r.locale.as_ref())).collect();
        let tree: Vec<_> = tree.into_iter().filter(|r| in_scope(r.locale.as_ref())).collect();

        let data = assemble_document(
            &collection.fields,
            &stored.shared,
            stored.localized.get(effective),
            &blocks,
            &tree,
            &relations,
        );
        Ok(Document {
            id: stored.id,
            collection: stored.collection,
            kind: collection.kind,
            data,
            locale: Some(locale.locale.clone()),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            status: stored.status,
            version_id: None,
            title: None,
            thumbnail: None,
        })
    }
}

fn version_document(
    collection: &CollectionConfig,
    stored: &StoredDocument,
    version: VersionRow,
    locale: &Locale,
) -> Document {
    Document {
        id: stored.id,
        collection: collection.slug.clone(),
        kind: collection.kind,
        data: version.data,
        locale: Some(locale.clone()),
        created_at: stored.created_at,
        updated_at: version.updated_at,
        status: Some(version.status),
        version_id: Some(version.id),
        title: None,
        thumbnail: None,
    }
}
