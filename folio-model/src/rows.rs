//! Splitting documents into storage rows and assembling them back.
//!
//! A document is stored as a root row (shared and per-locale data), block
//! rows, tree rows and relation rows. Block and tree rows are flattened: each
//! row records the path of the list it belongs to and its position there, so
//! nested rows address their parent as `<list>.<position>.<field>`.

use crate::config_map::{BLOCK_TYPE_KEY, CHILDREN_KEY, build_config_map};
use crate::field::{Field, FieldKind, RelationShape, find_block};
use crate::merge::deep_merge;
use crate::path::FieldPath;
use crate::{Data, ModelError};
use folio_types::{DocumentId, Locale, RowId};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// Key carrying a row id inside block and tree elements.
pub const ID_KEY: &str = "id";
/// Keys of a polymorphic relation value.
pub const RELATION_TO_KEY: &str = "relationTo";
pub const RELATION_VALUE_KEY: &str = "value";

/// Identity of an incoming block or tree row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockIdent {
    /// A persisted row id.
    Stable(RowId),
    /// A client-side placeholder; the row is new.
    Temporary(String),
}

impl BlockIdent {
    /// Anything that is not a row id is a temporary placeholder.
    pub fn parse(raw: &str) -> Self {
        match RowId::parse(raw) {
            Ok(id) => BlockIdent::Stable(id),
            Err(_) => BlockIdent::Temporary(raw.to_string()),
        }
    }

    pub fn stable(&self) -> Option<RowId> {
        match self {
            BlockIdent::Stable(id) => Some(*id),
            BlockIdent::Temporary(_) => None,
        }
    }
}

/// A flattened block or tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeBlock {
    pub id: Option<BlockIdent>,
    /// Path of the list this row belongs to.
    pub path: FieldPath,
    pub position: usize,
    /// Selected schema for polymorphic block rows; `None` for tree nodes.
    pub block_type: Option<String>,
    pub locale: Option<Locale>,
    pub data: Data,
}

impl TreeBlock {
    pub fn stable_id(&self) -> Option<RowId> {
        self.id.as_ref().and_then(BlockIdent::stable)
    }
}

/// One edge from a document field to another document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    /// `None` until persisted, or for incoming values that carry no row id.
    pub id: Option<RowId>,
    pub path: FieldPath,
    pub position: usize,
    pub relation_to: String,
    pub relation_id: DocumentId,
    /// `None` for relations shared across locales.
    pub locale: Option<Locale>,
}

/// Incoming relations share the stored shape; only the id may be absent.
pub type IncomingRelation = RelationRecord;

/// A document broken into its storage rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitDocument {
    pub shared: Data,
    pub localized: Data,
    pub blocks: Vec<TreeBlock>,
    pub tree: Vec<TreeBlock>,
    pub relations: Vec<RelationRecord>,
}

/// Splits `data` into root data and rows.
///
/// Rows of localized fields (or fields nested inside localized structures)
/// are tagged with `locale`; everything else is shared. Unknown keys and
/// block elements whose type matches no schema are dropped.
pub fn split_document(
    fields: &[Field],
    data: &Data,
    locale: Option<&Locale>,
) -> Result<SplitDocument, ModelError> {
    let mut splitter = Splitter {
        locale,
        blocks: Vec::new(),
        tree: Vec::new(),
        relations: Vec::new(),
    };
    let mut shared = Data::new();
    let mut localized = Data::new();
    splitter.root(fields, data, &FieldPath::root(), &mut shared, &mut localized, false)?;
    Ok(SplitDocument {
        shared,
        localized,
        blocks: splitter.blocks,
        tree: splitter.tree,
        relations: splitter.relations,
    })
}

struct Splitter<'a> {
    locale: Option<&'a Locale>,
    blocks: Vec<TreeBlock>,
    tree: Vec<TreeBlock>,
    relations: Vec<RelationRecord>,
}

impl Splitter<'_> {
    fn scope(&self, localized: bool) -> Option<Locale> {
        if localized { self.locale.cloned() } else { None }
    }

    fn root(
        &mut self,
        fields: &[Field],
        data: &Data,
        base: &FieldPath,
        shared: &mut Data,
        localized: &mut Data,
        inherited: bool,
    ) -> Result<(), ModelError> {
        for field in fields {
            let is_localized = inherited || field.localized;
            match &field.kind {
                FieldKind::Group { fields: children } => {
                    if let Some(nested) = data.get(&field.name).and_then(Value::as_object) {
                        self.root_nested(&field.name, children, nested, base, shared, localized, is_localized)?;
                    }
                }
                FieldKind::Tabs { tabs } => {
                    for tab in tabs {
                        if let Some(nested) = data.get(&tab.name).and_then(Value::as_object) {
                            self.root_nested(&tab.name, &tab.fields, nested, base, shared, localized, is_localized)?;
                        }
                    }
                }
                FieldKind::Blocks { .. } | FieldKind::Tree { .. } => {
                    self.rows(field, data, base, self.scope(is_localized))?;
                }
                _ => {
                    if let Some(shape) = field.relation_shape() {
                        let path = base.key(&field.name);
                        self.relation_values(&path, shape, data.get(&field.name), self.scope(is_localized))?;
                    } else if let Some(value) = data.get(&field.name) {
                        let target = if is_localized { &mut *localized } else { &mut *shared };
                        target.insert(field.name.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn root_nested(
        &mut self,
        name: &str,
        fields: &[Field],
        nested: &Data,
        base: &FieldPath,
        shared: &mut Data,
        localized: &mut Data,
        is_localized: bool,
    ) -> Result<(), ModelError> {
        let mut sub_shared = Data::new();
        let mut sub_localized = Data::new();
        self.root(fields, nested, &base.key(name), &mut sub_shared, &mut sub_localized, is_localized)?;
        if !sub_shared.is_empty() {
            shared.insert(name.to_string(), Value::Object(sub_shared));
        }
        if !sub_localized.is_empty() {
            localized.insert(name.to_string(), Value::Object(sub_localized));
        }
        Ok(())
    }

    /// Collects the data of one row; nested structures become rows of their own.
    fn row_data(
        &mut self,
        fields: &[Field],
        source: &Data,
        base: &FieldPath,
        locale: Option<Locale>,
    ) -> Result<Data, ModelError> {
        let mut out = Data::new();
        for field in fields {
            match &field.kind {
                FieldKind::Group { fields: children } => {
                    if let Some(nested) = source.get(&field.name).and_then(Value::as_object) {
                        let inner = self.row_data(children, nested, &base.key(&field.name), locale.clone())?;
                        out.insert(field.name.clone(), Value::Object(inner));
                    }
                }
                FieldKind::Tabs { tabs } => {
                    for tab in tabs {
                        if let Some(nested) = source.get(&tab.name).and_then(Value::as_object) {
                            let inner = self.row_data(&tab.fields, nested, &base.key(&tab.name), locale.clone())?;
                            out.insert(tab.name.clone(), Value::Object(inner));
                        }
                    }
                }
                FieldKind::Blocks { .. } | FieldKind::Tree { .. } => {
                    self.rows(field, source, base, locale.clone())?;
                }
                _ => {
                    if let Some(shape) = field.relation_shape() {
                        let path = base.key(&field.name);
                        self.relation_values(&path, shape, source.get(&field.name), locale.clone())?;
                    } else if let Some(value) = source.get(&field.name) {
                        out.insert(field.name.clone(), value.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    fn rows(
        &mut self,
        field: &Field,
        source: &Data,
        base: &FieldPath,
        locale: Option<Locale>,
    ) -> Result<(), ModelError> {
        let Some(items) = source.get(&field.name).and_then(Value::as_array) else {
            return Ok(());
        };
        let path = base.key(&field.name);
        match &field.kind {
            FieldKind::Blocks { blocks } => {
                let mut position = 0;
                for item in items {
                    let Some(element) = item.as_object() else {
                        continue;
                    };
                    let Some(slug) = element.get(BLOCK_TYPE_KEY).and_then(Value::as_str) else {
                        continue;
                    };
                    let Some(schema) = find_block(blocks, slug) else {
                        debug!("Skipping block of unknown type '{}' at {}", slug, path);
                        continue;
                    };
                    let data = self.row_data(&schema.fields, element, &path.index(position), locale.clone())?;
                    self.blocks.push(TreeBlock {
                        id: row_ident(element),
                        path: path.clone(),
                        position,
                        block_type: Some(slug.to_string()),
                        locale: locale.clone(),
                        data,
                    });
                    position += 1;
                }
            }
            FieldKind::Tree { fields } => self.tree_nodes(fields, items, &path, locale)?,
            _ => {}
        }
        Ok(())
    }

    fn tree_nodes(
        &mut self,
        fields: &[Field],
        nodes: &[Value],
        path: &FieldPath,
        locale: Option<Locale>,
    ) -> Result<(), ModelError> {
        let mut position = 0;
        for node in nodes {
            let Some(node) = node.as_object() else {
                continue;
            };
            let node_path = path.index(position);
            let data = self.row_data(fields, node, &node_path, locale.clone())?;
            self.tree.push(TreeBlock {
                id: row_ident(node),
                path: path.clone(),
                position,
                block_type: None,
                locale: locale.clone(),
                data,
            });
            if let Some(children) = node.get(CHILDREN_KEY).and_then(Value::as_array) {
                self.tree_nodes(fields, children, &node_path.key(CHILDREN_KEY), locale.clone())?;
            }
            position += 1;
        }
        Ok(())
    }

    fn relation_values(
        &mut self,
        path: &FieldPath,
        shape: RelationShape<'_>,
        value: Option<&Value>,
        locale: Option<Locale>,
    ) -> Result<(), ModelError> {
        let values: Vec<&Value> = match value {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Array(items)) if shape.has_many => items.iter().collect(),
            Some(other) if !shape.has_many => vec![other],
            Some(_) => {
                return Err(ModelError::InvalidRelation {
                    path: path.to_string(),
                    reason: "expected a list of references".into(),
                });
            }
        };
        for (position, value) in values.into_iter().filter(|v| !v.is_null()).enumerate() {
            let (id, relation_to, relation_id) = parse_reference(path, shape, value)?;
            self.relations.push(RelationRecord {
                id,
                path: path.clone(),
                position,
                relation_to,
                relation_id,
                locale: locale.clone(),
            });
        }
        Ok(())
    }
}

fn row_ident(element: &Data) -> Option<BlockIdent> {
    element.get(ID_KEY).and_then(Value::as_str).map(BlockIdent::parse)
}

/// Accepts a bare id (single-target relations), a `{relationTo, value}`
/// object (optionally carrying the relation row `id`) or a populated document.
fn parse_reference(
    path: &FieldPath,
    shape: RelationShape<'_>,
    value: &Value,
) -> Result<(Option<RowId>, String, DocumentId), ModelError> {
    let invalid = |reason: String| ModelError::InvalidRelation {
        path: path.to_string(),
        reason,
    };
    let document_id = |raw: &Value| -> Result<DocumentId, ModelError> {
        let raw = match raw {
            Value::String(s) => s.as_str(),
            Value::Object(doc) => doc.get(ID_KEY).and_then(Value::as_str).unwrap_or_default(),
            _ => "",
        };
        DocumentId::parse(raw).map_err(|e| invalid(format!("invalid document id '{raw}': {e}")))
    };
    let single_target = || -> Result<String, ModelError> {
        match shape.relation_to {
            [only] => Ok(only.clone()),
            _ => Err(invalid("polymorphic relations need a relationTo".into())),
        }
    };

    match value {
        Value::Object(obj) if obj.contains_key(RELATION_TO_KEY) => {
            let relation_to = obj
                .get(RELATION_TO_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("relationTo must be a string".into()))?;
            if !shape.relation_to.iter().any(|r| r == relation_to) {
                return Err(invalid(format!("'{relation_to}' is not an allowed target")));
            }
            let target = obj
                .get(RELATION_VALUE_KEY)
                .ok_or_else(|| invalid("missing value".into()))?;
            let row_id = obj
                .get(ID_KEY)
                .and_then(Value::as_str)
                .and_then(|raw| RowId::parse(raw).ok());
            Ok((row_id, relation_to.to_string(), document_id(target)?))
        }
        Value::String(_) | Value::Object(_) => Ok((None, single_target()?, document_id(value)?)),
        other => Err(invalid(format!("unsupported reference {other}"))),
    }
}

/// Rebuilds document data from its rows.
///
/// `localized` is deep-merged over `shared`. Block and tree rows are placed
/// parents first, ordered by position, so gaps in stored positions collapse.
/// Relations are rendered at their paths: bare ids for single-target fields,
/// `{relationTo, value}` objects for polymorphic ones. Structural fields with
/// no rows come back as empty lists.
pub fn assemble_document(
    fields: &[Field],
    shared: &Data,
    localized: Option<&Data>,
    blocks: &[TreeBlock],
    tree: &[TreeBlock],
    relations: &[RelationRecord],
) -> Data {
    let mut data = shared.clone();
    if let Some(localized) = localized {
        deep_merge(&mut data, localized);
    }

    let mut rows: Vec<&TreeBlock> = blocks.iter().chain(tree.iter()).collect();
    rows.sort_by(|a, b| {
        (a.path.len(), &a.path, a.position).cmp(&(b.path.len(), &b.path, b.position))
    });
    for row in rows {
        let mut element = row.data.clone();
        if let Some(id) = row.stable_id() {
            element.insert(ID_KEY.into(), Value::String(id.to_string()));
        }
        if let Some(block_type) = &row.block_type {
            element.insert(BLOCK_TYPE_KEY.into(), Value::String(block_type.clone()));
        }
        if !append_row(&mut data, &row.path, Value::Object(element)) {
            debug!("Dropping orphaned row at {} (position {})", row.path, row.position);
        }
    }

    fill_structural(fields, &mut data);

    let mut by_path: BTreeMap<&FieldPath, Vec<&RelationRecord>> = BTreeMap::new();
    for relation in relations {
        by_path.entry(&relation.path).or_default().push(relation);
    }
    for records in by_path.values_mut() {
        records.sort_by_key(|r| r.position);
    }

    let map = build_config_map(&data, fields);
    for (path, _, shape) in map.relations() {
        let records = by_path.get(path).map(Vec::as_slice).unwrap_or_default();
        let render = |r: &RelationRecord| {
            if shape.is_polymorphic() {
                json!({ RELATION_TO_KEY: r.relation_to, RELATION_VALUE_KEY: r.relation_id.to_string() })
            } else {
                Value::String(r.relation_id.to_string())
            }
        };
        let value = if shape.has_many {
            Value::Array(records.iter().map(|r| render(r)).collect())
        } else {
            records.first().map(|r| render(r)).unwrap_or(Value::Null)
        };
        path.insert(&mut data, value);
    }
    data
}

fn append_row(data: &mut Data, path: &FieldPath, element: Value) -> bool {
    if path.lookup(data).is_none() {
        let parent_exists = path
            .parent()
            .is_some_and(|parent| parent.is_empty() || parent.lookup(data).is_some_and(Value::is_object));
        if !parent_exists || !path.insert(data, Value::Array(Vec::new())) {
            return false;
        }
    }
    match path.lookup_mut(data) {
        Some(Value::Array(items)) => {
            items.push(element);
            true
        }
        Some(slot) if slot.is_null() => {
            *slot = Value::Array(vec![element]);
            true
        }
        _ => false,
    }
}

/// Ensures every group is an object and every blocks/tree list exists.
fn fill_structural(fields: &[Field], data: &mut Data) {
    for field in fields {
        match &field.kind {
            FieldKind::Group { fields: children } => {
                let slot = data
                    .entry(field.name.clone())
                    .or_insert_with(|| Value::Object(Data::new()));
                if let Value::Object(nested) = slot {
                    fill_structural(children, nested);
                }
            }
            FieldKind::Tabs { tabs } => {
                for tab in tabs {
                    let slot = data
                        .entry(tab.name.clone())
                        .or_insert_with(|| Value::Object(Data::new()));
                    if let Value::Object(nested) = slot {
                        fill_structural(&tab.fields, nested);
                    }
                }
            }
            FieldKind::Blocks { blocks } => {
                let slot = data.entry(field.name.clone()).or_insert_with(|| Value::Array(Vec::new()));
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    for element in items.iter_mut().filter_map(Value::as_object_mut) {
                        let schema = element
                            .get(BLOCK_TYPE_KEY)
                            .and_then(Value::as_str)
                            .and_then(|slug| find_block(blocks, slug));
                        if let Some(schema) = schema {
                            fill_structural(&schema.fields, element);
                        }
                    }
                }
            }
            FieldKind::Tree { fields: node_fields } => {
                let slot = data.entry(field.name.clone()).or_insert_with(|| Value::Array(Vec::new()));
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    fill_tree(node_fields, items);
                }
            }
            _ => {}
        }
    }
}

fn fill_tree(fields: &[Field], nodes: &mut [Value]) {
    for node in nodes.iter_mut().filter_map(Value::as_object_mut) {
        fill_structural(fields, node);
        let children = node
            .entry(CHILDREN_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(children) = children {
            fill_tree(fields, children);
        }
    }
}
