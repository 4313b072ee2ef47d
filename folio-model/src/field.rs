use crate::access::Access;
use crate::path::FieldPath;
use crate::{Data, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One logical property of a collection or area.
///
/// Scalar kinds hold a single value (or a list, for has-many selects and
/// relations). Structural kinds nest further fields: groups and tabs as
/// objects, blocks as a polymorphic list and trees as a self-nesting list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub localized: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub access: FieldAccess,
    #[serde(skip)]
    pub is_empty: Option<EmptyPredicate>,
    #[serde(skip)]
    pub validate: Option<Validator>,
}

/// The closed set of field kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Date,
    #[serde(rename_all = "camelCase")]
    Select {
        options: Vec<String>,
        #[serde(default)]
        has_many: bool,
    },
    #[serde(rename_all = "camelCase")]
    Relation {
        relation_to: Vec<String>,
        #[serde(default)]
        has_many: bool,
    },
    #[serde(rename_all = "camelCase")]
    Upload { relation_to: String },
    RichText,
    Json,
    Group { fields: Vec<Field> },
    Tabs { tabs: Vec<Tab> },
    Blocks { blocks: Vec<BlockSchema> },
    Tree { fields: Vec<Field> },
}

/// A named tab; its name is a path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub name: String,
    pub fields: Vec<Field>,
}

/// One selectable schema of a blocks field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSchema {
    pub slug: String,
    pub fields: Vec<Field>,
}

/// How a relation-like field stores its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationShape<'a> {
    pub relation_to: &'a [String],
    pub has_many: bool,
}

impl RelationShape<'_> {
    /// Polymorphic relations render as `{relationTo, value}` objects.
    pub fn is_polymorphic(&self) -> bool {
        self.relation_to.len() > 1
    }
}

/// Per-operation field access; `None` allows.
#[derive(Debug, Clone, Default)]
pub struct FieldAccess {
    pub create: Option<Access>,
    pub read: Option<Access>,
    pub update: Option<Access>,
}

impl FieldAccess {
    pub fn for_operation(&self, operation: Operation) -> Option<&Access> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => None,
        }
    }
}

type EmptyFn = dyn Fn(&Value) -> Result<bool, String> + Send + Sync;

/// Decides whether a value counts as empty for required checks and fallback.
#[derive(Clone)]
pub struct EmptyPredicate(Arc<EmptyFn>);

impl EmptyPredicate {
    pub fn new(f: impl Fn(&Value) -> Result<bool, String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value) -> Result<bool, String> {
        (self.0)(value)
    }
}

impl fmt::Debug for EmptyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmptyPredicate(..)")
    }
}

/// Context handed to a custom field validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidationArgs<'a> {
    pub path: &'a FieldPath,
    pub data: &'a Data,
    pub operation: Operation,
}

type ValidateFn = dyn Fn(&Value, &ValidationArgs<'_>) -> Result<(), String> + Send + Sync;

/// A custom validator; `Err` carries the user-facing message.
#[derive(Clone)]
pub struct Validator(Arc<ValidateFn>);

impl Validator {
    pub fn new(
        f: impl Fn(&Value, &ValidationArgs<'_>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value, args: &ValidationArgs<'_>) -> Result<(), String> {
        (self.0)(value, args)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

impl Field {
    fn simple(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            localized: false,
            hidden: false,
            default_value: None,
            access: FieldAccess::default(),
            is_empty: None,
            validate: None,
        }
    }

    /// Shorthand for a single-line text field.
    pub fn text(name: &str) -> Self {
        Self::simple(name, FieldKind::Text)
    }

    /// Shorthand for a multi-line text field.
    pub fn textarea(name: &str) -> Self {
        Self::simple(name, FieldKind::Textarea)
    }

    pub fn email(name: &str) -> Self {
        Self::simple(name, FieldKind::Email)
    }

    pub fn number(name: &str) -> Self {
        Self::simple(name, FieldKind::Number)
    }

    pub fn checkbox(name: &str) -> Self {
        Self::simple(name, FieldKind::Checkbox)
    }

    /// Shorthand for an RFC 3339 date field.
    pub fn date(name: &str) -> Self {
        Self::simple(name, FieldKind::Date)
    }

    pub fn rich_text(name: &str) -> Self {
        Self::simple(name, FieldKind::RichText)
    }

    pub fn json(name: &str) -> Self {
        Self::simple(name, FieldKind::Json)
    }

    /// Shorthand for a single-choice select.
    pub fn select(name: &str, options: &[&str]) -> Self {
        Self::simple(
            name,
            FieldKind::Select {
                options: options.iter().map(|o| (*o).to_string()).collect(),
                has_many: false,
            },
        )
    }

    /// Shorthand for a single relation to one collection.
    pub fn relation(name: &str, relation_to: &str) -> Self {
        Self::simple(
            name,
            FieldKind::Relation {
                relation_to: vec![relation_to.into()],
                has_many: false,
            },
        )
    }

    /// Shorthand for a has-many relation to one collection.
    pub fn relation_many(name: &str, relation_to: &str) -> Self {
        Self::relation(name, relation_to).has_many()
    }

    /// Shorthand for a relation that may target several collections.
    pub fn polymorphic_relation(name: &str, relation_to: &[&str]) -> Self {
        Self::simple(
            name,
            FieldKind::Relation {
                relation_to: relation_to.iter().map(|r| (*r).to_string()).collect(),
                has_many: false,
            },
        )
    }

    /// Shorthand for an upload reference.
    pub fn upload(name: &str, relation_to: &str) -> Self {
        Self::simple(
            name,
            FieldKind::Upload {
                relation_to: relation_to.into(),
            },
        )
    }

    pub fn group(name: &str, fields: Vec<Field>) -> Self {
        Self::simple(name, FieldKind::Group { fields })
    }

    /// Tabs do not add a path segment of their own; each tab does.
    pub fn tabs(tabs: Vec<Tab>) -> Self {
        Self::simple("tabs", FieldKind::Tabs { tabs })
    }

    pub fn blocks(name: &str, blocks: Vec<BlockSchema>) -> Self {
        Self::simple(name, FieldKind::Blocks { blocks })
    }

    pub fn tree(name: &str, fields: Vec<Field>) -> Self {
        Self::simple(name, FieldKind::Tree { fields })
    }

    // ── Modifiers ────────────────────────────────────────────────

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Switches a select or relation to has-many. No-op on other kinds.
    #[must_use]
    pub fn has_many(mut self) -> Self {
        if let FieldKind::Select { has_many, .. } | FieldKind::Relation { has_many, .. } =
            &mut self.kind
        {
            *has_many = true;
        }
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: FieldAccess) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_is_empty(
        mut self,
        f: impl Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    ) -> Self {
        self.is_empty = Some(EmptyPredicate::new(f));
        self
    }

    #[must_use]
    pub fn with_validator(
        mut self,
        f: impl Fn(&Value, &ValidationArgs<'_>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Validator::new(f));
        self
    }

    // ── Introspection ────────────────────────────────────────────

    /// True for groups, tabs, blocks and trees.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Group { .. }
                | FieldKind::Tabs { .. }
                | FieldKind::Blocks { .. }
                | FieldKind::Tree { .. }
        )
    }

    /// Relation and upload fields are persisted as relation rows.
    pub fn relation_shape(&self) -> Option<RelationShape<'_>> {
        match &self.kind {
            FieldKind::Relation {
                relation_to,
                has_many,
            } => Some(RelationShape {
                relation_to,
                has_many: *has_many,
            }),
            FieldKind::Upload { relation_to } => Some(RelationShape {
                relation_to: std::slice::from_ref(relation_to),
                has_many: false,
            }),
            _ => None,
        }
    }

    /// Type-appropriate value used when neither data nor a default exist.
    pub fn zero_value(&self) -> Value {
        match &self.kind {
            FieldKind::Checkbox => Value::Bool(false),
            FieldKind::Select { has_many: true, .. }
            | FieldKind::Relation { has_many: true, .. }
            | FieldKind::Blocks { .. }
            | FieldKind::Tree { .. } => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }

    /// Applies the field's emptiness rule to a possibly-absent value.
    ///
    /// A custom predicate wins over the per-kind default. Its failures are
    /// returned to the caller, who decides how to treat them.
    pub fn value_is_empty(&self, value: Option<&Value>) -> Result<bool, String> {
        let Some(value) = value else {
            return Ok(true);
        };
        if let Some(predicate) = &self.is_empty {
            return predicate.check(value);
        }
        Ok(match (&self.kind, value) {
            (_, Value::Null) => true,
            (FieldKind::Checkbox | FieldKind::Number | FieldKind::Json, _) => false,
            (_, Value::String(s)) => s.is_empty(),
            (_, Value::Array(items)) => items.is_empty(),
            (_, Value::Object(map)) => map.is_empty(),
            _ => false,
        })
    }
}

impl Tab {
    pub fn new(name: &str, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

impl BlockSchema {
    pub fn new(slug: &str, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}

/// Finds the block schema selected by `slug`.
pub fn find_block<'a>(blocks: &'a [BlockSchema], slug: &str) -> Option<&'a BlockSchema> {
    blocks.iter().find(|b| b.slug == slug)
}
