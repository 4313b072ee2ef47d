mod common;

use async_trait::async_trait;
use common::{Harness, data, editor, harness, validation_message};
use folio_model::{Document, Operation};
use folio_pipeline::steps::{BeginTransaction, PersistRoot, StoreUpload};
use folio_pipeline::{OperationContext, Pipeline, PipelineError, PipelineResult, Step};
use folio_storage::{FileStore, StorageAdapter, Upload};
use folio_types::Locale;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn png(name: &str) -> Upload {
    Upload::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

async fn create_photo(h: &Harness) -> Document {
    h.service
        .create("media", editor(), data(json!({ "alt": "A photo" })), Some(png("photo.png")))
        .await
        .unwrap()
}

// ── Storing ──────────────────────────────────────────────────────

#[tokio::test]
async fn upload_fills_file_fields() {
    let h = harness();
    let doc = create_photo(&h).await;

    assert_eq!(doc.get_str("filename"), Some("photo.png"));
    assert_eq!(doc.get_str("mimeType"), Some("image/png"));
    assert_eq!(doc.get_number("filesize"), Some(4.0));
    assert_eq!(doc.get_str("url"), Some("/media/photo.png"));
    assert_eq!(doc.thumbnail.as_deref(), Some("/media/thumbnails/photo.png"));
    assert!(h.files.get("photo.png").await.is_some());
}

#[tokio::test]
async fn create_without_file_is_rejected() {
    let h = harness();
    let result = h
        .service
        .create("media", editor(), data(json!({ "alt": "nothing" })), None)
        .await;
    assert_eq!(validation_message(result, "filename"), "A file upload is required.");
    assert!(h.files.is_empty().await);
}

#[tokio::test]
async fn unaccepted_mime_type_is_rejected() {
    let h = harness();
    let pdf = Upload::new("report.pdf", "application/pdf", b"%PDF".to_vec());
    let result = h
        .service
        .create("media", editor(), data(json!({})), Some(pdf))
        .await;
    assert!(validation_message(result, "mimeType").contains("application/pdf"));
    assert!(h.files.is_empty().await);
}

#[tokio::test]
async fn non_upload_collection_refuses_files() {
    let h = harness();
    let result = h
        .service
        .create("posts", editor(), data(json!({ "title": "T" })), Some(png("stray.png")))
        .await;
    assert!(validation_message(result, "file").contains("posts"));
}

// ── Replacing & removing ─────────────────────────────────────────

#[tokio::test]
async fn update_without_file_keeps_it() {
    let h = harness();
    let doc = create_photo(&h).await;

    let updated = h
        .service
        .update("media", doc.id, editor(), data(json!({ "alt": "Renamed" })), None)
        .await
        .unwrap();
    assert_eq!(updated.get_str("alt"), Some("Renamed"));
    assert_eq!(updated.get_str("filename"), Some("photo.png"));
    assert_eq!(h.files.len().await, 1);
}

#[tokio::test]
async fn replacing_file_removes_the_old_one() {
    let h = harness();
    let doc = create_photo(&h).await;

    let updated = h
        .service
        .update("media", doc.id, editor(), data(json!({})), Some(png("photo.png")))
        .await
        .unwrap();

    assert_eq!(updated.get_str("filename"), Some("photo-1.png"));
    assert_eq!(updated.get_str("alt"), Some("A photo"));
    assert!(h.files.get("photo.png").await.is_none());
    assert!(h.files.get("photo-1.png").await.is_some());
    assert_eq!(h.files.len().await, 1);
}

#[tokio::test]
async fn delete_removes_the_file() {
    let h = harness();
    let doc = create_photo(&h).await;

    h.service.delete("media", doc.id, editor()).await.unwrap();
    assert!(h.files.is_empty().await);
}

#[tokio::test]
async fn upload_relations_populate_with_file_fields() {
    let h = harness();
    let photo = create_photo(&h).await;
    let post = h
        .service
        .create(
            "posts",
            editor(),
            data(json!({ "title": "Illustrated", "hero": photo.id.to_string() })),
            None,
        )
        .await
        .unwrap();

    let read = h.service.find_by_id("posts", post.id, editor()).await.unwrap();
    assert_eq!(read.get_str("hero.url"), Some("/media/photo.png"));
    assert_eq!(read.get_str("hero._thumbnail"), Some("/media/thumbnails/photo.png"));
}

// ── Failed writes ────────────────────────────────────────────────

struct FailingWrite;

#[async_trait]
impl Step for FailingWrite {
    fn name(&self) -> &'static str {
        "failing_write"
    }

    async fn run(&self, _ctx: OperationContext) -> PipelineResult<OperationContext> {
        Err(PipelineError::Operation("disk full".into()))
    }
}

#[tokio::test]
async fn failed_write_removes_the_stored_file() {
    let h = harness();
    let files: Arc<dyn FileStore> = h.files.clone();
    let storage: Arc<dyn StorageAdapter> = h.storage.clone();
    let pipeline = Pipeline::new("media:create")
        .step(StoreUpload::new(files))
        .step(BeginTransaction::new(storage))
        .step(PersistRoot)
        .step(FailingWrite);
    let media = Arc::clone(h.service.collection_config("media").unwrap());
    let ctx = OperationContext::new(Operation::Create, media, Locale::new("en"), editor().actor)
        .with_data(data(json!({ "alt": "never saved" })))
        .with_upload(Some(png("orphan.png")));

    let result = pipeline.run(ctx).await;
    assert!(matches!(result, Err(PipelineError::Operation(_))));

    for _ in 0..100 {
        if h.files.is_empty().await {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(h.files.get("orphan.png").await.is_none());
    assert!(h.files.is_empty().await);
    assert_eq!(h.service.find("media", editor()).await.unwrap().total_docs, 0);
}
