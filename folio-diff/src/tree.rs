//! Tree and block row diff.
//!
//! Rows are flattened (see [`TreeBlock`]), so every node is diffed on its own:
//! nested content is compared at its own path, never as part of its parent.
//! Only rows with a stable id can match; temporary ids, missing ids and stable
//! ids unknown to the store are all new rows.

use folio_model::{BLOCK_TYPE_KEY, CHILDREN_KEY, Data, ID_KEY, TreeBlock};
use folio_types::RowId;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Keys that never take part in content comparison.
const TRANSIENT_KEYS: [&str; 5] = [ID_KEY, "path", "position", CHILDREN_KEY, BLOCK_TYPE_KEY];

/// The writes needed to turn the stored rows into the incoming ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDiff {
    pub to_add: Vec<TreeBlock>,
    /// Incoming rows whose stored counterpart moved or changed.
    pub to_update: Vec<TreeBlock>,
    pub to_delete: Vec<TreeBlock>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Row content with transient keys and nested row lists removed.
pub fn normalize(data: &Data) -> Data {
    data.iter()
        .filter(|(key, _)| !TRANSIENT_KEYS.contains(&key.as_str()))
        .filter(|(_, value)| !is_row_list(value))
        .map(|(key, value)| {
            let value = match value {
                Value::Object(nested) => Value::Object(normalize(nested)),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn is_row_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.iter().any(Value::is_object))
}

fn changed(stored: &TreeBlock, incoming: &TreeBlock) -> bool {
    stored.position != incoming.position
        || stored.path != incoming.path
        || stored.block_type != incoming.block_type
        || normalize(&stored.data) != normalize(&incoming.data)
}

/// Diffs stored rows of one document against the incoming ones.
///
/// A node moved under another parent keeps its row: it shows up in
/// `to_update` with its new `path`.
pub fn diff_tree(existing: &[TreeBlock], incoming: &[TreeBlock]) -> TreeDiff {
    let stored: HashMap<RowId, &TreeBlock> = existing
        .iter()
        .filter_map(|row| row.stable_id().map(|id| (id, row)))
        .collect();

    let mut diff = TreeDiff::default();
    let mut kept: HashSet<RowId> = HashSet::new();

    for row in incoming {
        let matched = row
            .stable_id()
            .and_then(|id| stored.get(&id).map(|s| (id, *s)))
            .filter(|(id, _)| !kept.contains(id));
        match matched {
            Some((id, previous)) => {
                kept.insert(id);
                if changed(previous, row) {
                    diff.to_update.push(row.clone());
                }
            }
            None => diff.to_add.push(row.clone()),
        }
    }

    diff.to_delete = existing
        .iter()
        .filter(|row| row.stable_id().is_none_or(|id| !kept.contains(&id)))
        .cloned()
        .collect();

    debug!(
        "Tree diff: {} add, {} update, {} delete",
        diff.to_add.len(),
        diff.to_update.len(),
        diff.to_delete.len()
    );
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_strips_transient_keys() {
        let data = json!({
            "id": "x",
            "label": "Home",
            "_children": [],
            "blockType": "quote",
            "meta": {"path": "p", "note": 1},
        });
        let normalized = normalize(data.as_object().unwrap());
        assert_eq!(Value::Object(normalized), json!({"label": "Home", "meta": {"note": 1}}));
    }

    #[test]
    fn normalize_keeps_scalar_lists() {
        let data = json!({"tags": ["a", "b"], "items": [{"x": 1}]});
        let normalized = normalize(data.as_object().unwrap());
        assert_eq!(Value::Object(normalized), json!({"tags": ["a", "b"]}));
    }
}
