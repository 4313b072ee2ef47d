use folio_diff::diff_tree;
use folio_model::{BlockIdent, Data, TreeBlock};
use folio_types::RowId;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

fn data(value: Value) -> Data {
    value.as_object().cloned().unwrap()
}

fn row(id: Option<BlockIdent>, path: &str, position: usize, label: &str) -> TreeBlock {
    TreeBlock {
        id,
        path: path.parse().unwrap(),
        position,
        block_type: None,
        locale: None,
        data: data(json!({"label": label})),
    }
}

fn stable(path: &str, position: usize, label: &str) -> TreeBlock {
    row(Some(BlockIdent::Stable(RowId::new())), path, position, label)
}

// ── Scenarios ───────────────────────────────────────────────────

#[test]
fn appended_node_without_id_is_the_only_change() {
    let a = stable("items", 0, "A");
    let fresh = row(None, "items", 1, "B");
    let diff = diff_tree(&[a.clone()], &[a, fresh.clone()]);
    assert_eq!(diff.to_add, vec![fresh]);
    assert!(diff.to_update.is_empty());
    assert!(diff.to_delete.is_empty());
}

#[test]
fn temporary_ids_are_new() {
    let tmp = row(Some(BlockIdent::Temporary("tmp-1".into())), "items", 0, "A");
    let diff = diff_tree(&[], &[tmp.clone()]);
    assert_eq!(diff.to_add, vec![tmp]);
}

#[test]
fn unknown_stable_id_is_new() {
    let existing = stable("items", 0, "A");
    let stranger = stable("items", 0, "A");
    let diff = diff_tree(&[existing.clone()], &[stranger.clone()]);
    assert_eq!(diff.to_add, vec![stranger]);
    assert_eq!(diff.to_delete, vec![existing]);
}

#[test]
fn reorder_updates_positions() {
    let a = stable("items", 0, "A");
    let b = stable("items", 1, "B");
    let mut a2 = a.clone();
    a2.position = 1;
    let mut b2 = b.clone();
    b2.position = 0;
    let diff = diff_tree(&[a, b], &[b2.clone(), a2.clone()]);
    assert_eq!(diff.to_update, vec![b2, a2]);
    assert!(diff.to_add.is_empty() && diff.to_delete.is_empty());
}

#[test]
fn content_change_is_an_update() {
    let a = stable("items", 0, "A");
    let mut edited = a.clone();
    edited.data = data(json!({"label": "A!"}));
    let diff = diff_tree(&[a], &[edited.clone()]);
    assert_eq!(diff.to_update, vec![edited]);
}

#[test]
fn transient_keys_do_not_count_as_changes() {
    let a = stable("items", 0, "A");
    let mut echoed = a.clone();
    echoed.data.insert("_children".into(), json!([{"label": "child"}]));
    echoed.data.insert("id".into(), json!("whatever"));
    let diff = diff_tree(&[a], &[echoed]);
    assert!(diff.is_empty());
}

#[test]
fn reparenting_updates_in_place() {
    let parent = stable("items", 0, "Parent");
    let sibling = stable("items", 1, "Sibling");
    let mut moved = sibling.clone();
    moved.path = "items.0._children".parse().unwrap();
    moved.position = 0;
    let diff = diff_tree(&[parent.clone(), sibling], &[parent, moved.clone()]);
    assert_eq!(diff.to_update, vec![moved]);
    assert!(diff.to_add.is_empty() && diff.to_delete.is_empty());
}

#[test]
fn block_type_switch_is_an_update() {
    let mut quote = stable("content", 0, "q");
    quote.block_type = Some("quote".into());
    let mut callout = quote.clone();
    callout.block_type = Some("callout".into());
    let diff = diff_tree(&[quote], &[callout.clone()]);
    assert_eq!(diff.to_update, vec![callout]);
}

#[test]
fn dropped_nodes_are_deleted() {
    let a = stable("items", 0, "A");
    let b = stable("items", 1, "B");
    let diff = diff_tree(&[a.clone(), b.clone()], &[a]);
    assert_eq!(diff.to_delete, vec![b]);
}

#[test]
fn repeated_stable_id_matches_once() {
    let a = stable("items", 0, "A");
    let mut copy = a.clone();
    copy.position = 1;
    let diff = diff_tree(&[a.clone()], &[a, copy.clone()]);
    assert_eq!(diff.to_add, vec![copy]);
    assert!(diff.to_update.is_empty());
}

// ============================================================================
// Idempotence and partition
// ============================================================================

fn tree_strategy() -> impl Strategy<Value = Vec<TreeBlock>> {
    prop::collection::vec(("[a-z]{1,6}", 0usize..3), 0..10).prop_map(|nodes| {
        nodes
            .into_iter()
            .enumerate()
            .map(|(i, (label, depth))| {
                let path = match depth {
                    0 => "items".to_string(),
                    d => format!("items{}", ".0._children".repeat(d)),
                };
                stable(&path, i, &label)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn diff_against_itself_is_empty(existing in tree_strategy()) {
        let diff = diff_tree(&existing, &existing);
        prop_assert!(diff.is_empty());
    }

    #[test]
    fn stored_rows_are_kept_or_deleted(
        existing in tree_strategy(),
        keep in prop::collection::vec(any::<bool>(), 10),
        extra in 0usize..4,
    ) {
        let mut incoming: Vec<TreeBlock> = existing
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(row, _)| row.clone())
            .collect();
        let kept = incoming.len();
        for i in 0..extra {
            incoming.push(row(None, "items", 100 + i, "new"));
        }

        let diff = diff_tree(&existing, &incoming);
        prop_assert_eq!(diff.to_add.len(), extra);
        prop_assert_eq!(diff.to_delete.len() + kept, existing.len());
        prop_assert!(diff.to_update.is_empty());
    }
}
