//! Collection and field access checks.

use crate::error::{PipelineError, PipelineResult};
use folio_model::{
    AccessArgs, BLOCK_TYPE_KEY, CHILDREN_KEY, CollectionConfig, Data, Field, FieldKind, Operation,
    find_block,
};
use folio_types::{Actor, DocumentId};
use serde_json::Value;

/// Whether `actor` may run `operation` on `collection`.
///
/// Collections without a predicate for the operation admit any
/// authenticated actor.
pub fn collection_allows(
    collection: &CollectionConfig,
    operation: Operation,
    actor: Option<&Actor>,
    id: Option<DocumentId>,
) -> bool {
    match collection.access.for_operation(operation) {
        Some(access) => access.allows(&AccessArgs { actor, id }),
        None => actor.is_some(),
    }
}

pub fn ensure_allowed(
    collection: &CollectionConfig,
    operation: Operation,
    actor: Option<&Actor>,
    id: Option<DocumentId>,
) -> PipelineResult<()> {
    if collection_allows(collection, operation, actor, id) {
        Ok(())
    } else {
        Err(PipelineError::Unauthorized {
            operation,
            collection: collection.slug.clone(),
        })
    }
}

/// Whether `actor` may touch `field` for `operation`. Fields without a
/// predicate are open.
pub fn field_allows(
    field: &Field,
    operation: Operation,
    actor: Option<&Actor>,
    id: Option<DocumentId>,
) -> bool {
    field
        .access
        .for_operation(operation)
        .is_none_or(|access| access.allows(&AccessArgs { actor, id }))
}

/// What [`prune_fields`] removes.
#[derive(Debug, Clone, Copy)]
pub struct PruneRules<'a> {
    pub operation: Operation,
    pub actor: Option<&'a Actor>,
    pub id: Option<DocumentId>,
    /// Also drop fields marked hidden.
    pub hidden: bool,
}

/// Removes every value of `data` whose field denies `rules.operation`,
/// walking into groups, tabs, blocks and tree nodes. Returns the number of
/// removed values.
pub fn prune_fields(fields: &[Field], data: &mut Data, rules: &PruneRules<'_>) -> usize {
    let mut removed = 0;
    for field in fields {
        if (rules.hidden && field.hidden)
            || !field_allows(field, rules.operation, rules.actor, rules.id)
        {
            match &field.kind {
                FieldKind::Tabs { tabs } => {
                    for tab in tabs {
                        removed += usize::from(data.remove(&tab.name).is_some());
                    }
                }
                _ => removed += usize::from(data.remove(&field.name).is_some()),
            }
            continue;
        }
        match &field.kind {
            FieldKind::Group { fields: children } => {
                if let Some(Value::Object(nested)) = data.get_mut(&field.name) {
                    removed += prune_fields(children, nested, rules);
                }
            }
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    if let Some(Value::Object(nested)) = data.get_mut(&tab.name) {
                        removed += prune_fields(&tab.fields, nested, rules);
                    }
                }
            }
            FieldKind::Blocks { blocks } => {
                if let Some(Value::Array(items)) = data.get_mut(&field.name) {
                    for item in items.iter_mut().filter_map(Value::as_object_mut) {
                        let schema = item
                            .get(BLOCK_TYPE_KEY)
                            .and_then(Value::as_str)
                            .and_then(|slug| find_block(blocks, slug));
                        if let Some(schema) = schema {
                            removed += prune_fields(&schema.fields, item, rules);
                        }
                    }
                }
            }
            FieldKind::Tree { fields: children } => {
                if let Some(Value::Array(nodes)) = data.get_mut(&field.name) {
                    removed += prune_tree(children, nodes, rules);
                }
            }
            _ => {}
        }
    }
    removed
}

fn prune_tree(fields: &[Field], nodes: &mut [Value], rules: &PruneRules<'_>) -> usize {
    let mut removed = 0;
    for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
        removed += prune_fields(fields, node, rules);
        if let Some(Value::Array(children)) = node.get_mut(CHILDREN_KEY) {
            removed += prune_tree(fields, children, rules);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{Access, FieldAccess, OperationAccess};
    use serde_json::json;

    fn admin_only() -> FieldAccess {
        let admin = Access::role("admin");
        FieldAccess {
            create: Some(admin.clone()),
            read: Some(admin.clone()),
            update: Some(admin),
        }
    }

    #[test]
    fn missing_collection_predicate_requires_a_user() {
        let posts = CollectionConfig::collection("posts", vec![]);
        let alice = Actor::new("alice");
        assert!(collection_allows(&posts, Operation::Read, Some(&alice), None));
        assert!(!collection_allows(&posts, Operation::Read, None, None));
    }

    #[test]
    fn explicit_predicate_wins() {
        let posts = CollectionConfig::collection("posts", vec![]).with_access(OperationAccess {
            read: Some(Access::anyone()),
            delete: Some(Access::nobody()),
            ..Default::default()
        });
        let alice = Actor::new("alice");
        assert!(collection_allows(&posts, Operation::Read, None, None));
        assert!(ensure_allowed(&posts, Operation::Delete, Some(&alice), None).is_err());
    }

    #[test]
    fn prune_walks_into_nested_structures() {
        let fields = vec![
            Field::text("title"),
            Field::group("meta", vec![Field::text("secret").with_access(admin_only())]),
            Field::tree("nav", vec![Field::text("label"), Field::text("note").hidden()]),
        ];
        let mut data = json!({
            "title": "Hello",
            "meta": {"secret": "s"},
            "nav": [{"label": "a", "note": "n", "_children": [{"label": "b", "note": "m"}]}],
        })
        .as_object()
        .cloned()
        .unwrap();
        let rules = PruneRules {
            operation: Operation::Read,
            actor: None,
            id: None,
            hidden: true,
        };

        assert_eq!(prune_fields(&fields, &mut data, &rules), 3);
        assert_eq!(
            Value::Object(data),
            json!({
                "title": "Hello",
                "meta": {},
                "nav": [{"label": "a", "_children": [{"label": "b"}]}],
            })
        );
    }
}
