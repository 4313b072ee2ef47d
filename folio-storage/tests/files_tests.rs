use folio_storage::{FileStore, MemoryFileStore, StorageError, Upload};

fn png(name: &str) -> Upload {
    Upload::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

#[tokio::test]
async fn store_reports_location_and_size() {
    let files = MemoryFileStore::new("https://cdn.example.com/media/");
    let stored = files.store(&png("cat.png")).await.unwrap();
    assert_eq!(stored.filename, "cat.png");
    assert_eq!(stored.url, "https://cdn.example.com/media/cat.png");
    assert_eq!(stored.filesize, 4);
    assert_eq!(
        stored.thumbnail_url.as_deref(),
        Some("https://cdn.example.com/media/thumbnails/cat.png")
    );
    assert_eq!(files.get("cat.png").await.unwrap().bytes.len(), 4);
}

#[tokio::test]
async fn clashing_names_get_a_suffix() {
    let files = MemoryFileStore::default();
    files.store(&png("cat.png")).await.unwrap();
    let second = files.store(&png("cat.png")).await.unwrap();
    let third = files.store(&png("cat.png")).await.unwrap();
    assert_eq!(second.filename, "cat-1.png");
    assert_eq!(third.filename, "cat-2.png");
    assert_eq!(files.len().await, 3);
}

#[tokio::test]
async fn non_images_have_no_thumbnail() {
    let files = MemoryFileStore::default();
    let stored = files
        .store(&Upload::new("report.pdf", "application/pdf", vec![1, 2, 3]))
        .await
        .unwrap();
    assert!(stored.thumbnail_url.is_none());
}

#[tokio::test]
async fn remove_missing_file_is_not_found() {
    let files = MemoryFileStore::default();
    files.store(&png("a.png")).await.unwrap();
    files.remove("a.png").await.unwrap();
    assert!(files.is_empty().await);
    assert!(matches!(files.remove("a.png").await, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn path_like_names_are_rejected() {
    let files = MemoryFileStore::default();
    let err = files.store(&png("../etc/passwd")).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(_)));
}
