//! The document service: one set of pipelines per collection, and the entry
//! points callers use.

use crate::config::ServiceConfig;
use crate::context::{OperationContext, Params};
use crate::error::{PipelineError, PipelineResult};
use crate::hooks::{HookPoint, HookRegistry};
use crate::loader::DocumentLoader;
use crate::query::RequestContext;
use crate::step::Pipeline;
use crate::steps::{
    Authorize, BeginTransaction, BuildConfigMaps, Collections, CommitTransaction, DeleteDocument,
    FetchDocument, FetchOriginal, FindDocuments, MergeFallback, MergeWithBlank, PersistRelations,
    PersistRoot, PersistRows, PersistVersion, PopulateRelations, Refetch, RemoveFiles,
    ResolveVersion, RunHooks, StoreUpload, Transform, Validate,
};
use folio_model::{CollectionConfig, Data, Document, Operation};
use folio_storage::{FileStore, FindQuery, MemoryFileStore, StorageAdapter, Upload};
use folio_types::DocumentId;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One page of a list read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedDocs {
    pub docs: Vec<Document>,
    pub total_docs: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_next_page: bool,
}

/// The pipelines of one collection. Areas have no create, list or delete.
struct CollectionPipelines {
    create: Option<Pipeline>,
    read: Pipeline,
    find: Option<Pipeline>,
    update: Pipeline,
    delete: Option<Pipeline>,
}

/// Shared dependencies the standard steps are built with.
struct Deps {
    storage: Arc<dyn StorageAdapter>,
    files: Arc<dyn FileStore>,
    loader: DocumentLoader,
    collections: Arc<Collections>,
}

impl Deps {
    fn create(&self, slug: &str, hooks: &HookRegistry) -> Pipeline {
        Pipeline::new(format!("{slug}:create"))
            .step(RunHooks::new(HookPoint::BeforeOperation, hooks))
            .step(Authorize)
            .step(MergeWithBlank)
            .step(BuildConfigMaps)
            .step(Validate::new(Arc::clone(&self.storage)))
            .step(RunHooks::new(HookPoint::BeforeCreate, hooks))
            .step(StoreUpload::new(Arc::clone(&self.files)))
            .step(BeginTransaction::new(Arc::clone(&self.storage)))
            .step(PersistRoot)
            .step(PersistRows::blocks())
            .step(PersistRows::tree())
            .step(PersistRelations)
            .step(PersistVersion)
            .step(CommitTransaction)
            .step(Refetch::new(self.loader.clone()))
            .step(Transform)
            .step(RunHooks::new(HookPoint::AfterCreate, hooks))
    }

    fn read(&self, slug: &str, hooks: &HookRegistry) -> Pipeline {
        Pipeline::new(format!("{slug}:read"))
            .step(RunHooks::new(HookPoint::BeforeOperation, hooks))
            .step(Authorize)
            .step(RunHooks::new(HookPoint::BeforeRead, hooks))
            .step(FetchDocument::new(self.loader.clone()))
            .step(PopulateRelations::new(self.loader.clone(), Arc::clone(&self.collections)))
            .step(Transform)
    }

    fn find(&self, slug: &str, hooks: &HookRegistry) -> Pipeline {
        Pipeline::new(format!("{slug}:find"))
            .step(RunHooks::new(HookPoint::BeforeOperation, hooks))
            .step(Authorize)
            .step(RunHooks::new(HookPoint::BeforeRead, hooks))
            .step(FindDocuments::new(self.loader.clone()))
            .step(PopulateRelations::new(self.loader.clone(), Arc::clone(&self.collections)))
            .step(Transform)
    }

    fn update(&self, collection: &CollectionConfig, hooks: &HookRegistry) -> Pipeline {
        let mut pipeline = Pipeline::new(format!("{}:update", collection.slug))
            .step(RunHooks::new(HookPoint::BeforeOperation, hooks))
            .step(Authorize)
            .step(ResolveVersion)
            .step(FetchOriginal::new(self.loader.clone()))
            .step(BuildConfigMaps)
            .step(MergeFallback)
            .step(Validate::new(Arc::clone(&self.storage)));
        if collection.is_area() {
            pipeline = pipeline.step(RunHooks::new(HookPoint::BeforeUpsert, hooks));
        }
        pipeline
            .step(RunHooks::new(HookPoint::BeforeUpdate, hooks))
            .step(StoreUpload::new(Arc::clone(&self.files)))
            .step(BeginTransaction::new(Arc::clone(&self.storage)))
            .step(PersistRoot)
            .step(PersistRows::blocks())
            .step(PersistRows::tree())
            .step(PersistRelations)
            .step(PersistVersion)
            .step(CommitTransaction)
            .step(RemoveFiles::new(Arc::clone(&self.files)))
            .step(Refetch::new(self.loader.clone()))
            .step(Transform)
            .step(RunHooks::new(HookPoint::AfterUpdate, hooks))
    }

    fn delete(&self, slug: &str, hooks: &HookRegistry) -> Pipeline {
        Pipeline::new(format!("{slug}:delete"))
            .step(RunHooks::new(HookPoint::BeforeOperation, hooks))
            .step(Authorize)
            .step(FetchOriginal::new(self.loader.clone()))
            .step(RunHooks::new(HookPoint::BeforeDelete, hooks))
            .step(BeginTransaction::new(Arc::clone(&self.storage)))
            .step(DeleteDocument)
            .step(CommitTransaction)
            .step(RemoveFiles::new(Arc::clone(&self.files)))
            .step(Transform)
            .step(RunHooks::new(HookPoint::AfterDelete, hooks))
    }

    fn pipelines(
        &self,
        collection: &CollectionConfig,
        hooks: &HookRegistry,
    ) -> CollectionPipelines {
        let slug = collection.slug.as_str();
        let area = collection.is_area();
        CollectionPipelines {
            create: (!area).then(|| self.create(slug, hooks)),
            read: self.read(slug, hooks),
            find: (!area).then(|| self.find(slug, hooks)),
            update: self.update(collection, hooks),
            delete: (!area).then(|| self.delete(slug, hooks)),
        }
    }
}

#[derive(Default)]
pub struct DocumentServiceBuilder {
    storage: Option<Arc<dyn StorageAdapter>>,
    files: Option<Arc<dyn FileStore>>,
    config: ServiceConfig,
    collections: Vec<(CollectionConfig, HookRegistry)>,
}

impl DocumentServiceBuilder {
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Defaults to a [`MemoryFileStore`].
    #[must_use]
    pub fn files(mut self, files: Arc<dyn FileStore>) -> Self {
        self.files = Some(files);
        self
    }

    #[must_use]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads the configuration with [`ServiceConfig::load_from`].
    #[must_use]
    pub fn config_file(self, path: impl AsRef<Path>) -> Self {
        self.config(ServiceConfig::load_from(path))
    }

    #[must_use]
    pub fn collection(self, collection: CollectionConfig) -> Self {
        self.collection_with_hooks(collection, HookRegistry::default())
    }

    #[must_use]
    pub fn collection_with_hooks(
        mut self,
        collection: CollectionConfig,
        hooks: HookRegistry,
    ) -> Self {
        self.collections.push((collection, hooks));
        self
    }

    pub fn build(self) -> PipelineResult<DocumentService> {
        let storage = self
            .storage
            .ok_or_else(|| PipelineError::Operation("no storage adapter configured".into()))?;
        let files = self
            .files
            .unwrap_or_else(|| Arc::new(MemoryFileStore::default()));

        let mut collections = Collections::new();
        for (collection, _) in &self.collections {
            let previous =
                collections.insert(collection.slug.clone(), Arc::new(collection.clone()));
            if previous.is_some() {
                return Err(PipelineError::Operation(format!(
                    "collection '{}' registered twice",
                    collection.slug
                )));
            }
            if collection.versions.as_ref().and_then(|v| v.max_per_doc) == Some(0) {
                return Err(PipelineError::Operation(format!(
                    "collection '{}' keeps no versions; max_per_doc must be at least 1",
                    collection.slug
                )));
            }
        }
        let deps = Deps {
            loader: DocumentLoader::new(Arc::clone(&storage)),
            storage,
            files,
            collections: Arc::new(collections),
        };
        let pipelines = self
            .collections
            .iter()
            .map(|(collection, hooks)| {
                (collection.slug.clone(), deps.pipelines(collection, hooks))
            })
            .collect();
        info!(
            "Document service ready: {} collections, default locale {}",
            deps.collections.len(),
            self.config.default_locale
        );
        Ok(DocumentService {
            config: self.config,
            collections: deps.collections,
            pipelines,
        })
    }
}

/// Runs document operations through the pipelines of each collection.
pub struct DocumentService {
    config: ServiceConfig,
    collections: Arc<Collections>,
    pipelines: HashMap<String, CollectionPipelines>,
}

impl DocumentService {
    pub fn builder() -> DocumentServiceBuilder {
        DocumentServiceBuilder::default()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn collection_config(&self, slug: &str) -> Option<&Arc<CollectionConfig>> {
        self.collections.get(slug)
    }

    /// The pipeline an operation on `slug` runs through. Reads by id and
    /// list reads both answer to [`Operation::Read`]; this returns the
    /// by-id one.
    pub fn pipeline(&self, slug: &str, operation: Operation) -> Option<&Pipeline> {
        let pipelines = self.pipelines.get(slug)?;
        match operation {
            Operation::Create => pipelines.create.as_ref(),
            Operation::Read => Some(&pipelines.read),
            Operation::Update => Some(&pipelines.update),
            Operation::Delete => pipelines.delete.as_ref(),
        }
    }

    pub async fn create(
        &self,
        slug: &str,
        req: RequestContext,
        data: Data,
        upload: Option<Upload>,
    ) -> PipelineResult<Document> {
        let (collection, pipelines) = self.lookup(slug)?;
        let pipeline = supported(slug, "create", pipelines.create.as_ref())?;
        let mut ctx = self
            .context(Operation::Create, collection, &req)?
            .with_data(data)
            .with_upload(upload);
        if collection.has_drafts() {
            ctx.params.draft.get_or_insert(false);
        }
        result(pipeline.run(ctx).await?)
    }

    pub async fn find_by_id(
        &self,
        slug: &str,
        id: DocumentId,
        req: RequestContext,
    ) -> PipelineResult<Document> {
        let (collection, pipelines) = self.lookup(slug)?;
        if collection.is_area() {
            return Err(unsupported(slug, "find_by_id"));
        }
        let mut ctx = self.context(Operation::Read, collection, &req)?;
        ctx.params.id = Some(id);
        result(pipelines.read.run(ctx).await?)
    }

    pub async fn find(&self, slug: &str, req: RequestContext) -> PipelineResult<PaginatedDocs> {
        let (collection, pipelines) = self.lookup(slug)?;
        let pipeline = supported(slug, "find", pipelines.find.as_ref())?;
        let ctx = self.context(Operation::Read, collection, &req)?;
        let limit = ctx.params.query.limit.unwrap_or(self.config.default_limit);
        let offset = ctx.params.query.offset;
        let ctx = pipeline.run(ctx).await?;
        Ok(PaginatedDocs {
            has_next_page: offset + ctx.docs.len() < ctx.total,
            total_docs: ctx.total,
            docs: ctx.docs,
            limit,
            offset,
        })
    }

    pub async fn update(
        &self,
        slug: &str,
        id: DocumentId,
        req: RequestContext,
        data: Data,
        upload: Option<Upload>,
    ) -> PipelineResult<Document> {
        let (collection, pipelines) = self.lookup(slug)?;
        if collection.is_area() {
            return Err(unsupported(slug, "update"));
        }
        self.run_update(collection, &pipelines.update, id, req, data, upload).await
    }

    pub async fn delete(
        &self,
        slug: &str,
        id: DocumentId,
        req: RequestContext,
    ) -> PipelineResult<Document> {
        let (collection, pipelines) = self.lookup(slug)?;
        let pipeline = supported(slug, "delete", pipelines.delete.as_ref())?;
        let mut ctx = self.context(Operation::Delete, collection, &req)?;
        ctx.params.id = Some(id);
        result(pipeline.run(ctx).await?)
    }

    /// Reads an area; one that was never written reads as its defaults.
    pub async fn find_area(&self, slug: &str, req: RequestContext) -> PipelineResult<Document> {
        let (collection, pipelines) = self.area(slug)?;
        let mut ctx = self.context(Operation::Read, collection, &req)?;
        ctx.params.id = Some(DocumentId::for_area(slug));
        result(pipelines.read.run(ctx).await?)
    }

    /// Writes an area, creating it on first write.
    pub async fn update_area(
        &self,
        slug: &str,
        req: RequestContext,
        data: Data,
    ) -> PipelineResult<Document> {
        let (collection, pipelines) = self.area(slug)?;
        let id = DocumentId::for_area(slug);
        self.run_update(collection, &pipelines.update, id, req, data, None).await
    }

    async fn run_update(
        &self,
        collection: &Arc<CollectionConfig>,
        pipeline: &Pipeline,
        id: DocumentId,
        req: RequestContext,
        data: Data,
        upload: Option<Upload>,
    ) -> PipelineResult<Document> {
        let mut ctx = self
            .context(Operation::Update, collection, &req)?
            .with_data(data)
            .with_upload(upload);
        ctx.params.id = Some(id);
        if collection.has_drafts() {
            ctx.params.draft.get_or_insert(false);
        }
        result(pipeline.run(ctx).await?)
    }

    fn lookup(
        &self,
        slug: &str,
    ) -> PipelineResult<(&Arc<CollectionConfig>, &CollectionPipelines)> {
        match (self.collections.get(slug), self.pipelines.get(slug)) {
            (Some(collection), Some(pipelines)) => Ok((collection, pipelines)),
            _ => Err(PipelineError::NotFound(format!("collection '{slug}'"))),
        }
    }

    fn area(
        &self,
        slug: &str,
    ) -> PipelineResult<(&Arc<CollectionConfig>, &CollectionPipelines)> {
        let found = self.lookup(slug)?;
        if !found.0.is_area() {
            return Err(PipelineError::NotFound(format!("area '{slug}'")));
        }
        Ok(found)
    }

    fn context(
        &self,
        operation: Operation,
        collection: &Arc<CollectionConfig>,
        req: &RequestContext,
    ) -> PipelineResult<OperationContext> {
        let locale = self.config.resolve_locale(req.requested_locale())?;
        let query = &req.params;
        let params = Params {
            id: None,
            select: query.select.clone(),
            draft: query.draft,
            version_id: query.version_id,
            depth: self.config.clamp_depth(query.depth),
            query: FindQuery {
                conditions: query.conditions.clone(),
                locale: None,
                sort: query.sort.clone(),
                limit: Some(self.config.clamp_limit(query.limit)),
                offset: query.offset.unwrap_or(0),
            },
            clear: query.clear.clone(),
        };
        Ok(OperationContext::new(operation, Arc::clone(collection), locale, req.actor.clone())
            .with_params(params)
            .with_fallback_locale(self.config.fallback_locale().cloned()))
    }
}

fn unsupported(slug: &str, operation: &str) -> PipelineError {
    PipelineError::NotFound(format!("'{slug}' has no {operation} operation"))
}

fn supported<'a>(
    slug: &str,
    operation: &str,
    pipeline: Option<&'a Pipeline>,
) -> PipelineResult<&'a Pipeline> {
    pipeline.ok_or_else(|| unsupported(slug, operation))
}

fn result(ctx: OperationContext) -> PipelineResult<Document> {
    ctx.doc.ok_or_else(|| {
        PipelineError::Operation(format!(
            "{} on '{}' produced no document",
            ctx.operation, ctx.collection.slug
        ))
    })
}
