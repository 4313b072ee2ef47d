//! Path-indexed field lookup built from a field tree and one data instance.
//!
//! The map is shaped by the data: block children are only mapped for the block
//! type actually present at each index, and tree nodes only for the nodes that
//! exist. A path missing from the map means "no field here", never an error.

use crate::field::{Field, FieldKind, RelationShape, find_block};
use crate::path::FieldPath;
use crate::Data;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key holding a block element's discriminant.
pub const BLOCK_TYPE_KEY: &str = "blockType";
/// Key holding a tree node's nested nodes.
pub const CHILDREN_KEY: &str = "_children";

/// Mapping from leaf field path to its configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap(BTreeMap<FieldPath, Field>);

impl ConfigMap {
    pub fn get(&self, path: &FieldPath) -> Option<&Field> {
        self.0.get(path)
    }

    /// Lookup by dotted path; unparsable paths are simply absent.
    pub fn get_str(&self, path: &str) -> Option<&Field> {
        self.0.get(&path.parse().ok()?)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.0.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &Field)> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Relation and upload fields with their storage shape.
    pub fn relations(&self) -> impl Iterator<Item = (&FieldPath, &Field, RelationShape<'_>)> {
        self.0
            .iter()
            .filter_map(|(path, field)| field.relation_shape().map(|shape| (path, field, shape)))
    }
}

/// Walks `fields` against `data` and records every realizable leaf path.
pub fn build_config_map(data: &Data, fields: &[Field]) -> ConfigMap {
    let mut map = BTreeMap::new();
    walk(&mut map, Some(data), fields, &FieldPath::root());
    ConfigMap(map)
}

fn walk(map: &mut BTreeMap<FieldPath, Field>, data: Option<&Data>, fields: &[Field], base: &FieldPath) {
    for field in fields {
        match &field.kind {
            FieldKind::Group { fields: children } => {
                let nested = data.and_then(|d| d.get(&field.name)).and_then(Value::as_object);
                walk(map, nested, children, &base.key(&field.name));
            }
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    let nested = data.and_then(|d| d.get(&tab.name)).and_then(Value::as_object);
                    walk(map, nested, &tab.fields, &base.key(&tab.name));
                }
            }
            FieldKind::Blocks { blocks } => {
                let Some(items) = data.and_then(|d| d.get(&field.name)).and_then(Value::as_array)
                else {
                    continue;
                };
                let path = base.key(&field.name);
                for (index, item) in items.iter().enumerate() {
                    let Some(element) = item.as_object() else {
                        continue;
                    };
                    let schema = element
                        .get(BLOCK_TYPE_KEY)
                        .and_then(Value::as_str)
                        .and_then(|slug| find_block(blocks, slug));
                    if let Some(schema) = schema {
                        walk(map, Some(element), &schema.fields, &path.index(index));
                    }
                }
            }
            FieldKind::Tree { fields: node_fields } => {
                if let Some(items) = data.and_then(|d| d.get(&field.name)).and_then(Value::as_array) {
                    walk_tree(map, items, node_fields, &base.key(&field.name));
                }
            }
            _ => {
                map.insert(base.key(&field.name), field.clone());
            }
        }
    }
}

fn walk_tree(map: &mut BTreeMap<FieldPath, Field>, nodes: &[Value], fields: &[Field], path: &FieldPath) {
    for (index, node) in nodes.iter().enumerate() {
        let Some(node) = node.as_object() else {
            continue;
        };
        let node_path = path.index(index);
        walk(map, Some(node), fields, &node_path);
        if let Some(children) = node.get(CHILDREN_KEY).and_then(Value::as_array) {
            walk_tree(map, children, fields, &node_path.key(CHILDREN_KEY));
        }
    }
}
