//! Blank-document merging (create) and fallback-from-original (update).

use crate::config_map::{BLOCK_TYPE_KEY, CHILDREN_KEY, ConfigMap};
use crate::field::{Field, FieldKind, find_block};
use crate::path::FieldPath;
use crate::Data;
use serde_json::Value;
use std::mem::discriminant;
use tracing::{debug, warn};

/// A document with every field at its default or type-appropriate zero value.
pub fn blank_document(fields: &[Field]) -> Data {
    let mut blank = Data::new();
    for field in fields {
        match &field.kind {
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    blank.insert(tab.name.clone(), Value::Object(blank_document(&tab.fields)));
                }
            }
            FieldKind::Group { fields: children } if field.default_value.is_none() => {
                blank.insert(field.name.clone(), Value::Object(blank_document(children)));
            }
            _ => {
                let value = field.default_value.clone().unwrap_or_else(|| field.zero_value());
                blank.insert(field.name.clone(), value);
            }
        }
    }
    blank
}

/// Recursively merges `overlay` into `base`.
///
/// Objects merge key by key; everything else, arrays included, is replaced
/// wholesale by the overlay's value.
pub fn deep_merge(base: &mut Data, overlay: &Data) {
    for (key, value) in overlay {
        if let (Some(Value::Object(target)), Value::Object(source)) = (base.get_mut(key), value) {
            deep_merge(target, source);
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
}

/// Merges partial create data over the blank document of `fields`.
pub fn merge_with_blank(fields: &[Field], incoming: &Data) -> Data {
    let mut merged = blank_document(fields);
    deep_merge(&mut merged, incoming);
    prune_unknown_blocks(fields, &mut merged);
    merged
}

/// Drops block elements whose discriminant matches no schema.
///
/// Keeps array indices identical between the config map, validation paths
/// and the stored row positions.
pub fn prune_unknown_blocks(fields: &[Field], data: &mut Data) {
    for field in fields {
        match &field.kind {
            FieldKind::Group { fields: children } => {
                if let Some(Value::Object(nested)) = data.get_mut(&field.name) {
                    prune_unknown_blocks(children, nested);
                }
            }
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    if let Some(Value::Object(nested)) = data.get_mut(&tab.name) {
                        prune_unknown_blocks(&tab.fields, nested);
                    }
                }
            }
            FieldKind::Blocks { blocks } => {
                let Some(Value::Array(items)) = data.get_mut(&field.name) else {
                    continue;
                };
                let before = items.len();
                items.retain(|item| {
                    item.get(BLOCK_TYPE_KEY)
                        .and_then(Value::as_str)
                        .is_some_and(|slug| find_block(blocks, slug).is_some())
                });
                if items.len() != before {
                    debug!("Pruned {} stale block(s) from '{}'", before - items.len(), field.name);
                }
                for element in items.iter_mut().filter_map(Value::as_object_mut) {
                    let schema = element
                        .get(BLOCK_TYPE_KEY)
                        .and_then(Value::as_str)
                        .and_then(|slug| find_block(blocks, slug));
                    if let Some(schema) = schema {
                        prune_unknown_blocks(&schema.fields, element);
                    }
                }
            }
            FieldKind::Tree { fields: node_fields } => {
                if let Some(Value::Array(nodes)) = data.get_mut(&field.name) {
                    prune_tree(node_fields, nodes);
                }
            }
            _ => {}
        }
    }
}

fn prune_tree(fields: &[Field], nodes: &mut [Value]) {
    for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
        prune_unknown_blocks(fields, node);
        if let Some(Value::Array(children)) = node.get_mut(CHILDREN_KEY) {
            prune_tree(fields, children);
        }
    }
}

fn is_ignored(path: &FieldPath, ignore: &[FieldPath]) -> bool {
    ignore.iter().any(|prefix| path.starts_with(prefix))
}

/// Copies blocks and tree lists the caller did not send from the original.
///
/// A partial update that omits a structural key keeps the stored rows; an
/// explicit value (including `[]`) replaces them. Returns the number of
/// lists carried over.
pub fn carry_over_structure(
    fields: &[Field],
    incoming: &mut Data,
    original: &Data,
    ignore: &[FieldPath],
) -> usize {
    carry_over_at(fields, incoming, original, &FieldPath::root(), ignore)
}

fn carry_over_at(
    fields: &[Field],
    incoming: &mut Data,
    original: &Data,
    base: &FieldPath,
    ignore: &[FieldPath],
) -> usize {
    let mut carried = 0;
    for field in fields {
        match &field.kind {
            FieldKind::Group { fields: children } => {
                carried += carry_over_nested(&field.name, children, incoming, original, base, ignore);
            }
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    carried += carry_over_nested(&tab.name, &tab.fields, incoming, original, base, ignore);
                }
            }
            FieldKind::Blocks { .. } | FieldKind::Tree { .. } => {
                let path = base.key(&field.name);
                if incoming.contains_key(&field.name) || is_ignored(&path, ignore) {
                    continue;
                }
                if let Some(value) = original.get(&field.name) {
                    incoming.insert(field.name.clone(), value.clone());
                    carried += 1;
                }
            }
            _ => {}
        }
    }
    carried
}

fn carry_over_nested(
    name: &str,
    fields: &[Field],
    incoming: &mut Data,
    original: &Data,
    base: &FieldPath,
    ignore: &[FieldPath],
) -> usize {
    let Some(Value::Object(original_nested)) = original.get(name) else {
        return 0;
    };
    match incoming.get_mut(name) {
        Some(Value::Object(nested)) => {
            carry_over_at(fields, nested, original_nested, &base.key(name), ignore)
        }
        _ => 0,
    }
}

/// Fills empty incoming values from the original document.
///
/// For each path of `map` (built from the incoming data) whose value is
/// empty per its field's emptiness rule, the original value at the same path
/// is copied in, provided `original_map` has a field of the same name and
/// kind there and the path is not covered by `ignore`. A failing emptiness
/// predicate counts as "not empty". Returns the number of restored values.
pub fn fallback_from_original(
    map: &ConfigMap,
    original_map: &ConfigMap,
    incoming: &mut Data,
    original: &Data,
    ignore: &[FieldPath],
) -> usize {
    let mut restored = 0;
    for (path, field) in map.iter() {
        if is_ignored(path, ignore) {
            continue;
        }
        let empty = match field.value_is_empty(path.lookup(incoming)) {
            Ok(empty) => empty,
            Err(reason) => {
                warn!("isEmpty check failed for '{}': {}; keeping incoming value", path, reason);
                false
            }
        };
        if !empty {
            continue;
        }
        let Some(original_field) = original_map.get(path) else {
            continue;
        };
        if original_field.name != field.name
            || discriminant(&original_field.kind) != discriminant(&field.kind)
        {
            continue;
        }
        match path.lookup(original) {
            Some(value) if !value.is_null() => {
                if path.insert(incoming, value.clone()) {
                    restored += 1;
                }
            }
            _ => {}
        }
    }
    restored
}
