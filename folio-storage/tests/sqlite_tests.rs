use chrono::Utc;
use folio_model::{BlockIdent, Data, DocumentStatus, FieldPath, RelationRecord, TreeBlock};
use folio_storage::{
    FindQuery, RootData, RowTable, Sort, SqliteStorage, StorageAdapter, StorageError, VersionRow,
};
use folio_types::{DocumentId, Locale, RowId, VersionId};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn data(value: Value) -> Data {
    value.as_object().cloned().unwrap()
}

fn root(shared: Value, locale: &str, localized: Value) -> RootData {
    RootData {
        shared: data(shared),
        locale: Locale::new(locale),
        localized: data(localized),
        status: None,
    }
}

async fn insert(store: &SqliteStorage, collection: &str, root: RootData) -> DocumentId {
    let id = DocumentId::new();
    let tx = store.begin().await.unwrap();
    tx.create_root(collection, id, &root).await.unwrap();
    tx.commit().await.unwrap();
    id
}

// ── Root rows ────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_by_id() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = insert(&store, "posts", root(json!({"slug": "a"}), "en", json!({"title": "Hello"}))).await;

    let doc = store.find_by_id("posts", id).await.unwrap().unwrap();
    assert_eq!(doc.shared, data(json!({"slug": "a"})));
    assert_eq!(doc.localized[&Locale::new("en")], data(json!({"title": "Hello"})));
    assert_eq!(doc.status, None);
    assert!(store.find_by_id("pages", id).await.unwrap().is_none());
}

#[tokio::test]
async fn create_twice_fails() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = DocumentId::new();
    let tx = store.begin().await.unwrap();
    let r = root(json!({}), "en", json!({}));
    tx.create_root("posts", id, &r).await.unwrap();
    let err = tx.create_root("posts", id, &r).await.unwrap_err();
    assert!(matches!(err, StorageError::Database(_)));
}

#[tokio::test]
async fn update_root_keeps_other_locales() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = insert(&store, "posts", root(json!({"slug": "a"}), "en", json!({"title": "Hello"}))).await;

    let tx = store.begin().await.unwrap();
    let mut de = root(json!({"slug": "b"}), "de", json!({"title": "Hallo"}));
    de.status = Some(DocumentStatus::Published);
    tx.update_root("posts", id, &de).await.unwrap();
    tx.commit().await.unwrap();

    let doc = store.find_by_id("posts", id).await.unwrap().unwrap();
    assert_eq!(doc.shared["slug"], "b");
    assert_eq!(doc.localized.len(), 2);
    assert_eq!(doc.localized[&Locale::new("en")]["title"], "Hello");
    assert_eq!(doc.status, Some(DocumentStatus::Published));
    assert!(doc.updated_at >= doc.created_at);
}

#[tokio::test]
async fn update_root_inserts_missing_document() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = DocumentId::for_area("settings");
    let tx = store.begin().await.unwrap();
    tx.update_root("settings", id, &root(json!({"siteName": "x"}), "en", json!({}))).await.unwrap();
    tx.commit().await.unwrap();
    assert!(store.find_by_id("settings", id).await.unwrap().is_some());
}

// ── Transactions ─────────────────────────────────────────────────

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = DocumentId::new();
    {
        let tx = store.begin().await.unwrap();
        tx.create_root("posts", id, &root(json!({}), "en", json!({}))).await.unwrap();
    }
    assert!(store.find_by_id("posts", id).await.unwrap().is_none());

    // The write gate is released again.
    let tx = store.begin().await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn reads_never_see_an_open_transaction() {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let id = DocumentId::new();
    let tx = store.begin().await.unwrap();
    tx.create_root("posts", id, &root(json!({}), "en", json!({"title": "uncommitted"})))
        .await
        .unwrap();
    tx.create_row(RowTable::Blocks, "posts", id, RowId::new(), &node("content", 0))
        .await
        .unwrap();

    // The transaction sees its own writes.
    assert_eq!(tx.rows(RowTable::Blocks, "posts", id).await.unwrap().len(), 1);

    // Plain reads wait until it ends.
    let blocked = timeout(Duration::from_millis(50), store.find_by_id("posts", id)).await;
    assert!(blocked.is_err());

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.find_by_id("posts", id).await })
    };
    tokio::task::yield_now().await;
    drop(tx);

    assert!(reader.await.unwrap().unwrap().is_none());
    assert!(store.rows(RowTable::Blocks, "posts", id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiting_reader_sees_the_committed_write() {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let id = DocumentId::new();
    let tx = store.begin().await.unwrap();
    tx.create_root("posts", id, &root(json!({"slug": "a"}), "en", json!({}))).await.unwrap();

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.find_by_id("posts", id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.commit().await.unwrap();

    let doc = reader.await.unwrap().unwrap().unwrap();
    assert_eq!(doc.shared["slug"], "a");
}

#[tokio::test]
async fn delete_removes_every_row_of_the_document() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let id = insert(&store, "posts", root(json!({}), "en", json!({}))).await;
    let tx = store.begin().await.unwrap();
    tx.create_relation("posts", id, RowId::new(), &relation(0, None)).await.unwrap();
    tx.create_row(RowTable::Tree, "posts", id, RowId::new(), &node("items", 0)).await.unwrap();
    tx.insert_version(&version(id, DocumentStatus::Draft, "en")).await.unwrap();
    tx.commit().await.unwrap();

    let tx = store.begin().await.unwrap();
    assert!(tx.delete_by_id("posts", id).await.unwrap());
    assert!(!tx.delete_by_id("posts", id).await.unwrap());
    tx.commit().await.unwrap();

    assert!(store.find_by_id("posts", id).await.unwrap().is_none());
    assert!(store.relations("posts", id).await.unwrap().is_empty());
    assert!(store.rows(RowTable::Tree, "posts", id).await.unwrap().is_empty());
    assert!(store.versions("posts", id).await.unwrap().is_empty());
}

// ── Relations and rows ───────────────────────────────────────────

fn relation(position: usize, locale: Option<&str>) -> RelationRecord {
    RelationRecord {
        id: None,
        path: "tags".parse().unwrap(),
        position,
        relation_to: "tags".into(),
        relation_id: DocumentId::new(),
        locale: locale.map(Locale::new),
    }
}

fn node(path: &str, position: usize) -> TreeBlock {
    TreeBlock {
        id: None,
        path: path.parse().unwrap(),
        position,
        block_type: None,
        locale: None,
        data: data(json!({"label": format!("node {position}")})),
    }
}

#[tokio::test]
async fn relation_rows_roundtrip_ordered() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let parent = DocumentId::new();
    let first = relation(0, None);
    let second = relation(1, Some("de"));
    let second_id = RowId::new();

    let tx = store.begin().await.unwrap();
    tx.create_relation("posts", parent, second_id, &second).await.unwrap();
    tx.create_relation("posts", parent, RowId::new(), &first).await.unwrap();
    tx.commit().await.unwrap();

    let stored = store.relations("posts", parent).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].relation_id, first.relation_id);
    assert_eq!(stored[1].id, Some(second_id));
    assert_eq!(stored[1].locale, Some(Locale::new("de")));

    let mut moved = second.clone();
    moved.position = 5;
    let tx = store.begin().await.unwrap();
    tx.update_relation(second_id, &moved).await.unwrap();
    tx.delete_relation(stored[0].id.unwrap()).await.unwrap();
    tx.commit().await.unwrap();

    let stored = store.relations("posts", parent).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].position, 5);
}

#[tokio::test]
async fn updating_a_missing_row_is_not_found() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let tx = store.begin().await.unwrap();
    let err = tx.update_row(RowTable::Blocks, RowId::new(), &node("content", 0)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn block_and_tree_tables_are_separate() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let parent = DocumentId::new();
    let mut block = node("content", 0);
    block.block_type = Some("quote".into());
    let block_id = RowId::new();

    let tx = store.begin().await.unwrap();
    tx.create_row(RowTable::Blocks, "posts", parent, block_id, &block).await.unwrap();
    tx.create_row(RowTable::Tree, "posts", parent, RowId::new(), &node("items", 0)).await.unwrap();
    tx.create_row(RowTable::Tree, "posts", parent, RowId::new(), &node("items.0._children", 0)).await.unwrap();
    tx.commit().await.unwrap();

    let blocks = store.rows(RowTable::Blocks, "posts", parent).await.unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, Some(BlockIdent::Stable(block_id)));
    assert_eq!(blocks[0].block_type.as_deref(), Some("quote"));

    let tree = store.rows(RowTable::Tree, "posts", parent).await.unwrap();
    let paths: Vec<String> = tree.iter().map(|r| r.path.to_string()).collect();
    assert_eq!(paths, vec!["items", "items.0._children"]);
}

// ── Versions ─────────────────────────────────────────────────────

fn version(parent: DocumentId, status: DocumentStatus, locale: &str) -> VersionRow {
    let now = Utc::now();
    VersionRow {
        id: VersionId::new(),
        collection: "posts".into(),
        parent_id: parent,
        status,
        locale: Locale::new(locale),
        data: data(json!({"title": format!("{status:?}")})),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn latest_version_filters_by_status_and_locale() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let parent = DocumentId::new();
    let published = version(parent, DocumentStatus::Published, "en");
    let mut draft = version(parent, DocumentStatus::Draft, "en");
    draft.updated_at = published.updated_at + chrono::Duration::seconds(1);

    let tx = store.begin().await.unwrap();
    tx.insert_version(&published).await.unwrap();
    tx.insert_version(&draft).await.unwrap();
    tx.commit().await.unwrap();

    let en = Locale::new("en");
    let latest = store.latest_version("posts", parent, &en, None).await.unwrap().unwrap();
    assert_eq!(latest.id, draft.id);
    let latest_published = store
        .latest_version("posts", parent, &en, Some(DocumentStatus::Published))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest_published.id, published.id);
    assert!(store.latest_version("posts", parent, &Locale::new("de"), None).await.unwrap().is_none());
}

#[tokio::test]
async fn update_and_prune_versions() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let parent = DocumentId::new();
    let mut rows = Vec::new();
    for i in 0..4 {
        let mut v = version(parent, DocumentStatus::Draft, "en");
        v.created_at += chrono::Duration::seconds(i);
        rows.push(v);
    }
    let tx = store.begin().await.unwrap();
    for v in &rows {
        tx.insert_version(v).await.unwrap();
    }
    tx.update_version(rows[3].id, DocumentStatus::Published, &data(json!({"title": "final"})))
        .await
        .unwrap();
    assert_eq!(tx.prune_versions("posts", parent, 2).await.unwrap(), 2);
    tx.commit().await.unwrap();

    let remaining = store.versions("posts", parent).await.unwrap();
    let ids: Vec<VersionId> = remaining.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![rows[3].id, rows[2].id]);
    assert_eq!(remaining[0].status, DocumentStatus::Published);
    assert_eq!(remaining[0].data["title"], "final");
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn find_filters_sorts_and_pages() {
    let store = SqliteStorage::open_in_memory().unwrap();
    for (slug, order, title) in [("a", 3, "Alpha"), ("b", 1, "Beta"), ("c", 2, "Gamma")] {
        insert(
            &store,
            "posts",
            root(json!({"slug": slug, "order": order, "meta": {"featured": order > 1}}), "en", json!({"title": title})),
        )
        .await;
    }

    let by_order = FindQuery {
        sort: Some(Sort::parse("order")),
        ..Default::default()
    };
    let slugs: Vec<Value> = store
        .find("posts", &by_order)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.shared["slug"].clone())
        .collect();
    assert_eq!(slugs, vec![json!("b"), json!("c"), json!("a")]);

    let featured = FindQuery::default().with_condition("meta.featured".parse().unwrap(), json!(true));
    assert_eq!(store.count("posts", &featured).await.unwrap(), 2);

    let localized = FindQuery {
        locale: Some(Locale::new("en")),
        ..Default::default()
    }
    .with_condition("title".parse::<FieldPath>().unwrap(), json!("Gamma"));
    let found = store.find("posts", &localized).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].shared["slug"], "c");

    let paged = FindQuery {
        sort: Some(Sort::parse("-order")),
        limit: Some(1),
        offset: 1,
        ..Default::default()
    };
    let page = store.find("posts", &paged).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].shared["slug"], "c");
    assert_eq!(store.count("posts", &paged).await.unwrap(), 3);
}

#[test]
fn sort_parse_handles_direction() {
    assert_eq!(
        Sort::parse("-createdAt"),
        Sort {
            field: "createdAt".into(),
            descending: true
        }
    );
    assert!(!Sort::parse("title").descending);
}

// ── On-disk ──────────────────────────────────────────────────────

#[tokio::test]
async fn on_disk_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.db");
    let id = {
        let store = SqliteStorage::new(&path).unwrap();
        insert(&store, "posts", root(json!({"slug": "kept"}), "en", json!({}))).await
    };
    let store = SqliteStorage::new(&path).unwrap();
    let doc = store.find_by_id("posts", id).await.unwrap().unwrap();
    assert_eq!(doc.shared["slug"], "kept");
}
