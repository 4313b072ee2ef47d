//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use folio_model::{
    Access, BlockSchema, CollectionConfig, Data, Document, Field, FieldAccess, UploadConfig,
    VersionsConfig,
};
use folio_pipeline::{
    DocumentService, HookRegistry, PipelineError, QueryParams, RequestContext, ServiceConfig,
};
use folio_storage::{MemoryFileStore, SqliteStorage, StorageAdapter};
use folio_types::{Actor, Locale};
use serde_json::{Value, json};
use std::sync::Arc;

pub struct Harness {
    pub service: DocumentService,
    pub storage: Arc<SqliteStorage>,
    pub files: Arc<MemoryFileStore>,
}

/// Turns a `json!({...})` literal into document data.
pub fn data(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn editor() -> RequestContext {
    RequestContext::as_actor(Actor::new("editor"))
}

pub fn admin() -> RequestContext {
    RequestContext::as_actor(Actor::new("admin").with_role("admin"))
}

pub fn categories() -> CollectionConfig {
    CollectionConfig::collection("categories", vec![Field::text("title").required()])
        .use_as_title("title")
}

pub fn media() -> CollectionConfig {
    CollectionConfig::collection("media", vec![Field::text("alt")]).with_upload(UploadConfig {
        mime_types: vec!["image/*".into()],
    })
}

pub fn posts() -> CollectionConfig {
    CollectionConfig::collection(
        "posts",
        vec![
            Field::text("title").required().localized(),
            Field::text("slug").unique(),
            Field::checkbox("featured"),
            Field::select("status", &["open", "closed"]),
            Field::relation("category", "categories"),
            Field::relation_many("related", "categories").localized(),
            Field::upload("hero", "media"),
            Field::blocks(
                "content",
                vec![
                    BlockSchema::new("quote", vec![Field::text("text")]),
                    BlockSchema::new("callout", vec![Field::textarea("body")]),
                ],
            ),
            Field::tree("nav", vec![Field::text("label")]),
            Field::group("meta", vec![Field::textarea("description")]),
            Field::text("internalNote").with_access(FieldAccess {
                read: Some(Access::role("admin")),
                ..FieldAccess::default()
            }),
            Field::text("secret").hidden(),
        ],
    )
    .use_as_title("title")
}

pub fn articles() -> CollectionConfig {
    CollectionConfig::collection(
        "articles",
        vec![Field::text("title").required(), Field::textarea("body")],
    )
    .with_versions(VersionsConfig {
        drafts: true,
        max_per_doc: Some(3),
    })
    .use_as_title("title")
}

pub fn settings() -> CollectionConfig {
    CollectionConfig::area(
        "settings",
        vec![
            Field::text("siteName"),
            Field::tree("footer", vec![Field::text("label")]),
        ],
    )
}

pub fn config() -> ServiceConfig {
    ServiceConfig {
        locales: vec![Locale::new("en"), Locale::new("de")],
        ..ServiceConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(Vec::new())
}

/// Builds a service over every fixture collection, attaching `hooks` to the
/// collections they name.
pub fn harness_with(mut hooks: Vec<(&str, HookRegistry)>) -> Harness {
    init_tracing();
    let storage = Arc::new(SqliteStorage::open_in_memory().expect("open in-memory database"));
    let files = Arc::new(MemoryFileStore::default());
    let shared: Arc<dyn StorageAdapter> = storage.clone();

    let mut builder = DocumentService::builder()
        .storage(shared)
        .files(files.clone())
        .config(config());
    for collection in [categories(), media(), posts(), articles(), settings()] {
        let registry = hooks
            .iter()
            .position(|(slug, _)| *slug == collection.slug)
            .map(|index| hooks.remove(index).1)
            .unwrap_or_default();
        builder = builder.collection_with_hooks(collection, registry);
    }
    Harness {
        service: builder.build().expect("build service"),
        storage,
        files,
    }
}

/// Asserts that `result` failed validation with an error at `path`, and
/// returns that error's message.
pub fn validation_message<T: std::fmt::Debug>(
    result: Result<T, PipelineError>,
    path: &str,
) -> String {
    match result {
        Err(PipelineError::Validation(errors)) => errors
            .for_path(path)
            .unwrap_or_else(|| panic!("no error at '{path}' in {errors}"))
            .message
            .clone(),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

pub async fn create_category(harness: &Harness, title: &str) -> Document {
    harness
        .service
        .create("categories", editor(), data(json!({ "title": title })), None)
        .await
        .expect("create category")
}

/// Request with relation population switched off.
pub fn unpopulated(req: RequestContext) -> RequestContext {
    req.with_params(QueryParams::from_pairs([("depth", "0")]).expect("depth parameter"))
}
