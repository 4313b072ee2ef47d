use crate::context::OperationContext;
use crate::error::{FieldError, PipelineResult, ValidationErrors};
use crate::step::Step;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use folio_model::{
    Field, FieldKind, FieldPath, ModelError, Operation, PathSegment, ValidationArgs,
    build_config_map, split_document,
};
use folio_storage::{FindQuery, StorageAdapter};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

const REQUIRED: &str = "This field is required.";

/// A failing emptiness predicate counts as "not empty".
fn is_empty(field: &Field, path: impl Display, value: Option<&Value>) -> bool {
    field.value_is_empty(value).unwrap_or_else(|reason| {
        warn!("isEmpty check failed for '{}': {}; treating the value as present", path, reason);
        false
    })
}

/// Checks the merged data: required values, value types, select options,
/// custom validators, uniqueness, relation targets and the upload payload.
///
/// Collects every failure before reporting. Draft saves skip the
/// required checks.
pub struct Validate {
    storage: Arc<dyn StorageAdapter>,
}

impl Validate {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    async fn is_taken(
        &self,
        ctx: &OperationContext,
        path: &FieldPath,
        value: &Value,
    ) -> PipelineResult<bool> {
        let query = FindQuery {
            locale: Some(ctx.locale.clone()),
            limit: Some(2),
            ..FindQuery::default()
        }
        .with_condition(path.clone(), value.clone());
        let matches = self.storage.find(ctx.slug(), &query).await?;
        Ok(matches.iter().any(|doc| Some(doc.id) != ctx.params.id))
    }

    async fn check_relations(
        &self,
        ctx: &OperationContext,
        errors: &mut ValidationErrors,
    ) -> PipelineResult<()> {
        let split = match split_document(&ctx.collection.fields, &ctx.data, Some(&ctx.locale)) {
            Ok(split) => split,
            Err(ModelError::InvalidRelation { path, reason }) => {
                errors.push(FieldError::new(path, reason));
                return Ok(());
            }
            Err(e) => {
                errors.push(FieldError::new("", e.to_string()));
                return Ok(());
            }
        };
        let mut checked = HashSet::new();
        for record in &split.relations {
            if !checked.insert((record.relation_to.clone(), record.relation_id)) {
                continue;
            }
            let exists = self
                .storage
                .find_by_id(&record.relation_to, record.relation_id)
                .await?
                .is_some();
            if !exists {
                errors.push(FieldError::new(
                    &record.path,
                    format!("{}/{} does not exist", record.relation_to, record.relation_id),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Step for Validate {
    fn name(&self) -> &'static str {
        "validate"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let collection = Arc::clone(&ctx.collection);
        let map = build_config_map(&ctx.data, &collection.fields);
        let skip_required = ctx.is_draft_save();
        let mut errors = ValidationErrors::default();

        for field in &collection.fields {
            if matches!(field.kind, FieldKind::Blocks { .. } | FieldKind::Tree { .. })
                && field.required
                && !skip_required
                && is_empty(field, &field.name, ctx.data.get(&field.name))
            {
                errors.push(FieldError::new(&field.name, REQUIRED));
            }
        }

        for (path, field) in map.iter() {
            let value = path.lookup(&ctx.data);
            if is_empty(field, path, value) {
                if field.required && !skip_required {
                    errors.push(FieldError::new(path, REQUIRED));
                }
                continue;
            }
            let Some(value) = value else {
                continue;
            };
            if let Err(message) = check_kind(field, value) {
                errors.push(FieldError::new(path, message));
                continue;
            }
            if let Some(validator) = &field.validate {
                let args = ValidationArgs {
                    path,
                    data: &ctx.data,
                    operation: ctx.operation,
                };
                if let Err(message) = validator.check(value, &args) {
                    errors.push(FieldError::new(path, message));
                    continue;
                }
            }
            let top_level = !path.segments().iter().any(|s| matches!(s, PathSegment::Index(_)));
            if field.unique && top_level && self.is_taken(&ctx, path, value).await? {
                errors.push(FieldError::new(path, "Value must be unique."));
            }
        }

        self.check_relations(&ctx, &mut errors).await?;

        if let Some(upload_config) = &collection.upload {
            match &ctx.upload {
                Some(upload) if !upload_config.accepts(&upload.mime_type) => {
                    errors.push(FieldError::new(
                        "mimeType",
                        format!("'{}' is not an accepted file type", upload.mime_type),
                    ));
                }
                Some(_) => {}
                None if ctx.operation == Operation::Create && !skip_required => {
                    errors.push(FieldError::new("filename", "A file upload is required."));
                }
                None => {}
            }
        } else if ctx.upload.is_some() {
            errors.push(FieldError::new(
                "file",
                format!("'{}' does not accept uploads", collection.slug),
            ));
        }

        if !errors.is_empty() {
            debug!("{}: {} validation errors", collection.slug, errors.len());
        }
        errors.into_result()?;
        ctx.config_map = Some(map);
        Ok(ctx)
    }
}

fn check_kind(field: &Field, value: &Value) -> Result<(), String> {
    match (&field.kind, value) {
        (FieldKind::Text | FieldKind::Textarea, Value::String(_)) => Ok(()),
        (FieldKind::Email, Value::String(s)) if is_email(s) => Ok(()),
        (FieldKind::Email, _) => Err("Please enter a valid email address.".into()),
        (FieldKind::Number, Value::Number(_)) => Ok(()),
        (FieldKind::Checkbox, Value::Bool(_)) => Ok(()),
        (FieldKind::Date, Value::String(s)) if is_date(s) => Ok(()),
        (FieldKind::Date, _) => Err("Please enter a valid date.".into()),
        (FieldKind::Select { options, has_many: false }, Value::String(s)) => option(options, s),
        (FieldKind::Select { options, has_many: true }, Value::Array(items)) => {
            items.iter().try_for_each(|item| match item.as_str() {
                Some(s) => option(options, s),
                None => Err("Options must be strings.".into()),
            })
        }
        (FieldKind::Relation { .. } | FieldKind::Upload { .. }, _) => Ok(()),
        (FieldKind::RichText | FieldKind::Json, _) => Ok(()),
        (FieldKind::Group { .. } | FieldKind::Tabs { .. }, Value::Object(_)) => Ok(()),
        (FieldKind::Blocks { .. } | FieldKind::Tree { .. }, Value::Array(_)) => Ok(()),
        (kind, _) => Err(format!("Expected {}.", expected(kind))),
    }
}

fn expected(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text | FieldKind::Textarea | FieldKind::Email | FieldKind::Date => "a string",
        FieldKind::Number => "a number",
        FieldKind::Checkbox => "true or false",
        FieldKind::Select { has_many: true, .. } => "a list of options",
        FieldKind::Select { .. } => "one of the options",
        FieldKind::Group { .. } | FieldKind::Tabs { .. } => "an object",
        FieldKind::Blocks { .. } | FieldKind::Tree { .. } => "a list",
        FieldKind::Relation { .. } | FieldKind::Upload { .. } => "a reference",
        FieldKind::RichText | FieldKind::Json => "JSON",
    }
}

fn option(options: &[String], value: &str) -> Result<(), String> {
    if options.iter().any(|o| o == value) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid option."))
    }
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
