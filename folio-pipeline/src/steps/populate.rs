use super::transform::present;
use crate::access::collection_allows;
use crate::context::OperationContext;
use crate::error::PipelineResult;
use crate::loader::{DocumentLoader, ReadLocale, ReadSource};
use crate::step::Step;
use async_trait::async_trait;
use folio_model::{
    CollectionConfig, Data, Field, Operation, RELATION_TO_KEY, RELATION_VALUE_KEY,
    build_config_map,
};
use folio_types::{Actor, DocumentId};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Every collection a service knows, by slug.
pub type Collections = HashMap<String, Arc<CollectionConfig>>;

#[derive(Clone, Copy)]
struct Reader<'a> {
    locale: ReadLocale<'a>,
    actor: Option<&'a Actor>,
}

/// Replaces relation ids with the documents they point at, `depth` levels
/// deep.
///
/// References the actor may not read, to unknown collections or to missing
/// documents stay ids.
pub struct PopulateRelations {
    loader: DocumentLoader,
    collections: Arc<Collections>,
}

impl PopulateRelations {
    pub fn new(loader: DocumentLoader, collections: Arc<Collections>) -> Self {
        Self {
            loader,
            collections,
        }
    }

    fn populate<'a>(
        &'a self,
        fields: &'a [Field],
        data: &'a mut Data,
        depth: usize,
        reader: Reader<'a>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        async move {
            if depth == 0 {
                return Ok(());
            }
            let map = build_config_map(data, fields);
            for (path, _, shape) in map.relations() {
                let Some(value) = path.lookup_mut(data) else {
                    continue;
                };
                match value {
                    Value::Array(items) if shape.has_many => {
                        for item in items.iter_mut() {
                            self.resolve(item, shape.relation_to, depth, reader).await?;
                        }
                    }
                    single => self.resolve(single, shape.relation_to, depth, reader).await?,
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn resolve(
        &self,
        value: &mut Value,
        relation_to: &[String],
        depth: usize,
        reader: Reader<'_>,
    ) -> PipelineResult<()> {
        let Some((slug, id)) = reference(value, relation_to) else {
            return Ok(());
        };
        let Some(target) = self.collections.get(&slug).cloned() else {
            return Ok(());
        };
        if !collection_allows(&target, Operation::Read, reader.actor, Some(id)) {
            debug!("Not populating {}/{}: read denied", slug, id);
            return Ok(());
        }
        let Some(mut doc) = self
            .loader
            .load(&target, id, reader.locale, ReadSource::Main)
            .await?
        else {
            return Ok(());
        };
        present(&target, &mut doc, reader.actor, None);
        self.populate(&target.fields, &mut doc.data, depth - 1, reader).await?;

        let populated = doc.to_json();
        match value {
            Value::Object(object) => {
                object.insert(RELATION_VALUE_KEY.to_string(), populated);
            }
            other => *other = populated,
        }
        Ok(())
    }
}

/// Target of a stored reference: a bare id for single-target fields or a
/// `{relationTo, value}` object.
fn reference(value: &Value, relation_to: &[String]) -> Option<(String, DocumentId)> {
    match value {
        Value::String(raw) if relation_to.len() == 1 => {
            Some((relation_to[0].clone(), DocumentId::parse(raw).ok()?))
        }
        Value::Object(object) => {
            let slug = object.get(RELATION_TO_KEY)?.as_str()?;
            let raw = object.get(RELATION_VALUE_KEY)?.as_str()?;
            Some((slug.to_string(), DocumentId::parse(raw).ok()?))
        }
        _ => None,
    }
}

#[async_trait]
impl Step for PopulateRelations {
    fn name(&self) -> &'static str {
        "populate_relations"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let depth = ctx.params.depth;
        if depth == 0 {
            return Ok(ctx);
        }
        let reader = Reader {
            locale: ReadLocale {
                locale: &ctx.locale,
                fallback: ctx.fallback_locale.as_ref(),
            },
            actor: ctx.actor.as_ref(),
        };
        let fields = &ctx.collection.fields;
        for doc in ctx.doc.iter_mut().chain(ctx.docs.iter_mut()) {
            self.populate(fields, &mut doc.data, depth, reader).await?;
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn references_come_in_two_shapes() {
        let id = DocumentId::new();
        let single = vec!["media".to_string()];
        assert_eq!(
            reference(&json!(id.to_string()), &single),
            Some(("media".to_string(), id))
        );

        let many = vec!["posts".to_string(), "pages".to_string()];
        assert_eq!(reference(&json!(id.to_string()), &many), None);
        assert_eq!(
            reference(&json!({"relationTo": "pages", "value": id.to_string()}), &many),
            Some(("pages".to_string(), id))
        );
        assert_eq!(reference(&json!({"relationTo": "pages", "value": {"id": 1}}), &many), None);
    }
}
