mod common;

use common::{data, editor, harness_with};
use folio_pipeline::{HookPoint, HookRegistry, OperationContext, PipelineError, hook_fn};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

/// Registers a hook on each of `points` that records `<label>:<point>`.
fn recording(log: &Log, label: &str, points: &[HookPoint]) -> HookRegistry {
    let mut registry = HookRegistry::new();
    for &point in points {
        let log = Arc::clone(log);
        let entry = format!("{label}:{point}");
        registry.register(
            point,
            hook_fn(move |ctx: OperationContext| {
                let log = Arc::clone(&log);
                let entry = entry.clone();
                async move {
                    log.lock().unwrap().push(entry);
                    anyhow::Ok(ctx)
                }
            }),
        );
    }
    registry
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ── Ordering ─────────────────────────────────────────────────────

#[tokio::test]
async fn create_hooks_run_in_pipeline_order() {
    let log = Log::default();
    let mut hooks = recording(
        &log,
        "a",
        &[HookPoint::AfterCreate, HookPoint::BeforeCreate, HookPoint::BeforeOperation],
    );
    let second = Arc::clone(&log);
    hooks.register(
        HookPoint::BeforeCreate,
        hook_fn(move |ctx: OperationContext| {
            let log = Arc::clone(&second);
            async move {
                log.lock().unwrap().push("b:beforeCreate".into());
                anyhow::Ok(ctx)
            }
        }),
    );
    let h = harness_with(vec![("posts", hooks)]);

    h.service
        .create("posts", editor(), data(json!({ "title": "Ordered" })), None)
        .await
        .unwrap();

    assert_eq!(
        entries(&log),
        vec!["a:beforeOperation", "a:beforeCreate", "b:beforeCreate", "a:afterCreate"]
    );
}

#[tokio::test]
async fn area_upsert_hooks_run_before_update_hooks() {
    let log = Log::default();
    let hooks = recording(
        &log,
        "settings",
        &[HookPoint::BeforeUpdate, HookPoint::BeforeUpsert, HookPoint::AfterUpdate],
    );
    let h = harness_with(vec![("settings", hooks)]);

    h.service
        .update_area("settings", editor(), data(json!({ "siteName": "Folio" })))
        .await
        .unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "settings:beforeUpsert",
            "settings:beforeUpdate",
            "settings:afterUpdate",
        ]
    );
}

#[tokio::test]
async fn read_and_delete_hooks_fire() {
    let log = Log::default();
    let hooks = recording(
        &log,
        "posts",
        &[HookPoint::BeforeRead, HookPoint::BeforeDelete, HookPoint::AfterDelete],
    );
    let h = harness_with(vec![("posts", hooks)]);

    let doc = h
        .service
        .create("posts", editor(), data(json!({ "title": "Short-lived" })), None)
        .await
        .unwrap();
    h.service.find_by_id("posts", doc.id, editor()).await.unwrap();
    h.service.delete("posts", doc.id, editor()).await.unwrap();

    assert_eq!(
        entries(&log),
        vec!["posts:beforeRead", "posts:beforeDelete", "posts:afterDelete"]
    );
}

// ── Aborting & modifying ─────────────────────────────────────────

#[tokio::test]
async fn failing_hook_aborts_without_writing() {
    let hooks = HookRegistry::new().with(
        HookPoint::BeforeCreate,
        hook_fn(|_ctx: OperationContext| async move {
            Err::<OperationContext, _>(anyhow::anyhow!("slug taken"))
        }),
    );
    let h = harness_with(vec![("posts", hooks)]);

    let result = h
        .service
        .create("posts", editor(), data(json!({ "title": "Rejected" })), None)
        .await;
    match result {
        Err(PipelineError::Hook { point, message }) => {
            assert_eq!(point, HookPoint::BeforeCreate);
            assert_eq!(message, "slug taken");
        }
        other => panic!("expected a hook error, got {other:?}"),
    }

    let page = h.service.find("posts", editor()).await.unwrap();
    assert_eq!(page.total_docs, 0);
}

#[tokio::test]
async fn hooks_can_rewrite_incoming_data() {
    let hooks = HookRegistry::new().with(
        HookPoint::BeforeCreate,
        hook_fn(|mut ctx: OperationContext| async move {
            let slug = ctx
                .data
                .get("title")
                .and_then(Value::as_str)
                .map(|title| title.to_lowercase().replace(' ', "-"));
            if let Some(slug) = slug {
                ctx.data.insert("slug".into(), Value::String(slug));
            }
            anyhow::Ok(ctx)
        }),
    );
    let h = harness_with(vec![("posts", hooks)]);

    let doc = h
        .service
        .create("posts", editor(), data(json!({ "title": "Hello World" })), None)
        .await
        .unwrap();
    assert_eq!(doc.get_str("slug"), Some("hello-world"));
}

#[tokio::test]
async fn hooks_see_the_original_on_update() {
    let seen = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let hooks = HookRegistry::new().with(
        HookPoint::BeforeUpdate,
        hook_fn(move |ctx: OperationContext| {
            let captured = Arc::clone(&captured);
            async move {
                let title = ctx
                    .original
                    .as_ref()
                    .and_then(|doc| doc.get_str("title"))
                    .map(str::to_string);
                *captured.lock().unwrap() = title;
                anyhow::Ok(ctx)
            }
        }),
    );
    let h = harness_with(vec![("posts", hooks)]);

    let doc = h
        .service
        .create("posts", editor(), data(json!({ "title": "Before" })), None)
        .await
        .unwrap();
    h.service
        .update("posts", doc.id, editor(), data(json!({ "title": "After" })), None)
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("Before"));
}
