use crate::access::{PruneRules, prune_fields};
use crate::context::OperationContext;
use crate::error::PipelineResult;
use crate::step::Step;
use async_trait::async_trait;
use folio_model::{CollectionConfig, Data, Document, FieldPath, Operation};
use folio_types::Actor;
use serde_json::Value;
use tracing::debug;

/// Shapes a document for the caller: drops hidden and read-denied values,
/// applies the projection and fills the `_title` and `_thumbnail`
/// projections.
pub(crate) fn present(
    collection: &CollectionConfig,
    doc: &mut Document,
    actor: Option<&Actor>,
    select: Option<&[FieldPath]>,
) {
    let rules = PruneRules {
        operation: Operation::Read,
        actor,
        id: Some(doc.id),
        hidden: true,
    };
    prune_fields(&collection.fields, &mut doc.data, &rules);
    doc.title = Some(title(collection, doc));
    doc.thumbnail = thumbnail(collection, doc);
    if let Some(select) = select {
        let mut projected = Data::new();
        for path in select {
            if let Some(value) = path.lookup(&doc.data) {
                projected_insert(&mut projected, path, value.clone());
            }
        }
        doc.data = projected;
    }
}

fn projected_insert(projected: &mut Data, path: &FieldPath, value: Value) {
    if !path.insert(projected, value) {
        debug!("select path {} cannot be projected on its own", path);
    }
}

fn title(collection: &CollectionConfig, doc: &Document) -> String {
    let value = collection
        .use_as_title
        .as_deref()
        .and_then(|field| doc.get(field));
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => doc.id.to_string(),
    }
}

fn thumbnail(collection: &CollectionConfig, doc: &Document) -> Option<String> {
    collection.upload.as_ref()?;
    let is_image = doc
        .get_str("mimeType")
        .is_some_and(|mime| mime.starts_with("image/"));
    if !is_image {
        return None;
    }
    doc.get_str("thumbnailUrl")
        .or_else(|| doc.get_str("url"))
        .map(str::to_string)
}

/// Applies [`present`] to every result of the run.
pub struct Transform;

#[async_trait]
impl Step for Transform {
    fn name(&self) -> &'static str {
        "transform"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let select = ctx.params.select.as_deref();
        for doc in ctx.doc.iter_mut().chain(ctx.docs.iter_mut()) {
            present(&ctx.collection, doc, ctx.actor.as_ref(), select);
        }
        Ok(ctx)
    }
}
