use folio_model::{BlockSchema, Data, Field, FieldKind, Tab, build_config_map};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeSet;

fn data(value: Value) -> Data {
    value.as_object().cloned().unwrap()
}

fn page_fields() -> Vec<Field> {
    vec![
        Field::text("title").required(),
        Field::relation_many("tags", "tags"),
        Field::group("meta", vec![Field::textarea("description"), Field::upload("image", "media")]),
        Field::tabs(vec![Tab::new("seo", vec![Field::text("keywords")])]),
        Field::blocks(
            "content",
            vec![
                BlockSchema::new("quote", vec![Field::text("text"), Field::text("author")]),
                BlockSchema::new("image", vec![Field::upload("file", "media")]),
            ],
        ),
        Field::tree("nav", vec![Field::text("label"), Field::relation("page", "pages")]),
    ]
}

fn paths(map: &folio_model::ConfigMap) -> Vec<String> {
    map.paths().map(ToString::to_string).collect()
}

// ── Scalar and nested structures ────────────────────────────────

#[test]
fn maps_scalars_groups_and_tabs() {
    let map = build_config_map(&data(json!({})), &page_fields());
    assert_eq!(
        paths(&map),
        vec!["meta.description", "meta.image", "seo.keywords", "tags", "title"]
    );
    assert!(map.get_str("title").unwrap().required);
}

#[test]
fn group_paths_exist_without_data() {
    let map = build_config_map(&Data::new(), &[Field::group("meta", vec![Field::text("a")])]);
    assert!(map.get_str("meta.a").is_some());
}

// ── Blocks ──────────────────────────────────────────────────────

#[test]
fn block_children_follow_the_selected_schema() {
    let doc = data(json!({
        "content": [
            {"blockType": "quote", "text": "hi"},
            {"blockType": "image", "file": null},
        ]
    }));
    let map = build_config_map(&doc, &page_fields());
    assert!(map.get_str("content.0.text").is_some());
    assert!(map.get_str("content.0.author").is_some());
    assert!(map.get_str("content.0.file").is_none());
    assert!(matches!(
        map.get_str("content.1.file").unwrap().kind,
        FieldKind::Upload { .. }
    ));
    assert!(map.get_str("content.1.text").is_none());
}

#[test]
fn unknown_block_types_are_skipped() {
    let doc = data(json!({"content": [{"blockType": "video", "url": "x"}]}));
    let map = build_config_map(&doc, &page_fields());
    assert!(map.paths().all(|p| !p.to_string().starts_with("content")));
}

// ── Trees ───────────────────────────────────────────────────────

#[test]
fn tree_nodes_map_recursively() {
    let doc = data(json!({
        "nav": [
            {"label": "Home", "_children": [{"label": "About"}]},
            {"label": "Blog"},
        ]
    }));
    let map = build_config_map(&doc, &page_fields());
    for path in ["nav.0.label", "nav.0.page", "nav.0._children.0.label", "nav.1.label"] {
        assert!(map.get_str(path).is_some(), "missing {path}");
    }
    assert!(map.get_str("nav.2.label").is_none());
}

#[test]
fn unknown_keys_are_absent() {
    let doc = data(json!({"title": "x", "stray": 1, "meta": {"other": true}}));
    let map = build_config_map(&doc, &page_fields());
    assert!(map.get_str("stray").is_none());
    assert!(map.get_str("meta.other").is_none());
}

#[test]
fn relations_lists_relation_like_fields() {
    let doc = data(json!({"nav": [{"label": "Home"}]}));
    let map = build_config_map(&doc, &page_fields());
    let relations: Vec<String> = map.relations().map(|(p, _, _)| p.to_string()).collect();
    assert_eq!(relations, vec!["meta.image", "nav.0.page", "tags"]);
}

// ── Completeness ────────────────────────────────────────────────

/// Leaf paths `page_fields()` declares for `doc`, derived by hand.
fn declared_leaves(doc: &Value) -> BTreeSet<String> {
    let mut out: BTreeSet<String> =
        ["title", "tags", "meta.description", "meta.image", "seo.keywords"]
            .into_iter()
            .map(String::from)
            .collect();
    if let Some(blocks) = doc["content"].as_array() {
        for (i, block) in blocks.iter().enumerate() {
            let children: &[&str] = match block["blockType"].as_str() {
                Some("quote") => &["text", "author"],
                Some("image") => &["file"],
                _ => &[],
            };
            out.extend(children.iter().map(|child| format!("content.{i}.{child}")));
        }
    }
    fn nodes(out: &mut BTreeSet<String>, prefix: &str, items: &[Value]) {
        for (i, node) in items.iter().enumerate() {
            let path = format!("{prefix}.{i}");
            out.insert(format!("{path}.label"));
            out.insert(format!("{path}.page"));
            if let Some(children) = node["_children"].as_array() {
                nodes(out, &format!("{path}._children"), children);
            }
        }
    }
    if let Some(nav) = doc["nav"].as_array() {
        nodes(&mut out, "nav", nav);
    }
    out
}

fn block_items() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["quote", "image", "video"]),
            prop::option::of("[a-z ]{0,8}"),
        )
            .prop_map(|(block_type, text)| json!({ "blockType": block_type, "text": text })),
        0..6,
    )
}

fn tree_nodes() -> impl Strategy<Value = Vec<Value>> {
    let leaves = prop::collection::vec("[a-z]{1,6}".prop_map(|label| json!({ "label": label })), 0..3);
    leaves.prop_recursive(3, 24, 3, |inner| {
        prop::collection::vec(("[a-z]{1,6}", inner), 0..3).prop_map(|nodes| {
            nodes
                .into_iter()
                .map(|(label, children)| json!({ "label": label, "_children": children }))
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn every_declared_leaf_is_mapped_once(
        title in prop::option::of("[a-z]{0,8}"),
        content in block_items(),
        nav in tree_nodes(),
    ) {
        let doc = json!({ "title": title, "content": content, "nav": nav });
        let map = build_config_map(&data(doc.clone()), &page_fields());

        let mapped: Vec<String> = map.paths().map(ToString::to_string).collect();
        let unique: BTreeSet<String> = mapped.iter().cloned().collect();
        prop_assert_eq!(mapped.len(), unique.len());
        prop_assert_eq!(&unique, &declared_leaves(&doc));

        for (i, block) in doc["content"].as_array().into_iter().flatten().enumerate() {
            if block["blockType"] == "video" {
                let prefix = format!("content.{i}.");
                prop_assert!(mapped.iter().all(|path| !path.starts_with(&prefix)));
            }
        }
    }
}
