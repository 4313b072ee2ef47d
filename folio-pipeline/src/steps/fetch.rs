use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{DocumentLoader, ReadLocale, ReadSource};
use crate::step::Step;
use async_trait::async_trait;
use chrono::Utc;
use folio_model::Document;
use folio_model::merge::blank_document;
use folio_storage::FindQuery;
use futures::future::try_join_all;

fn read_locale(ctx: &OperationContext) -> ReadLocale<'_> {
    ReadLocale {
        locale: &ctx.locale,
        fallback: ctx.fallback_locale.as_ref(),
    }
}

/// Reads one document, from the draft or version the request asks for.
///
/// An area that was never written reads as its blank document.
pub struct FetchDocument {
    loader: DocumentLoader,
}

impl FetchDocument {
    pub fn new(loader: DocumentLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Step for FetchDocument {
    fn name(&self) -> &'static str {
        "fetch_document"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let id = ctx.require_id()?;
        let source = ReadSource::for_request(ctx.params.draft, ctx.params.version_id);
        let doc = self
            .loader
            .load(&ctx.collection, id, read_locale(&ctx), source)
            .await?;
        let doc = match doc {
            Some(doc) => doc,
            None if ctx.collection.is_area() => {
                let now = Utc::now();
                Document {
                    id,
                    collection: ctx.collection.slug.clone(),
                    kind: ctx.collection.kind,
                    data: blank_document(&ctx.collection.fields),
                    locale: Some(ctx.locale.clone()),
                    created_at: now,
                    updated_at: now,
                    status: None,
                    version_id: None,
                    title: None,
                    thumbnail: None,
                }
            }
            None => return Err(PipelineError::NotFound(format!("{}/{}", ctx.slug(), id))),
        };
        ctx.doc = Some(doc);
        Ok(ctx)
    }
}

/// Reads one page of a list query plus the total number of matches.
pub struct FindDocuments {
    loader: DocumentLoader,
}

impl FindDocuments {
    pub fn new(loader: DocumentLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Step for FindDocuments {
    fn name(&self) -> &'static str {
        "find_documents"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let query = FindQuery {
            locale: Some(ctx.locale.clone()),
            ..ctx.params.query.clone()
        };
        let storage = self.loader.storage();
        let (stored, total) = futures::try_join!(
            storage.find(ctx.slug(), &query),
            storage.count(ctx.slug(), &query),
        )?;
        let source = ReadSource::for_request(ctx.params.draft, None);
        let docs = try_join_all(stored.into_iter().map(|doc| {
            self.loader
                .from_stored(&ctx.collection, doc, read_locale(&ctx), source)
        }))
        .await?;
        ctx.docs = docs;
        ctx.total = total;
        Ok(ctx)
    }
}

/// Re-reads what a write stored, so the result reflects canonical row ids
/// and rendered relations.
pub struct Refetch {
    loader: DocumentLoader,
}

impl Refetch {
    pub fn new(loader: DocumentLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Step for Refetch {
    fn name(&self) -> &'static str {
        "refetch"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let id = ctx.require_id()?;
        let source = match (ctx.writes_main_document(), ctx.params.version_id) {
            (false, Some(version_id)) => ReadSource::Version(version_id),
            _ => ReadSource::Main,
        };
        let locale = ReadLocale {
            locale: &ctx.locale,
            fallback: None,
        };
        let doc = self
            .loader
            .load(&ctx.collection, id, locale, source)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("{}/{}", ctx.slug(), id)))?;
        ctx.doc = Some(doc);
        Ok(ctx)
    }
}
