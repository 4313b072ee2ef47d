//! Request boundary: raw query parameters into typed values.

use crate::error::{FieldError, PipelineError, PipelineResult, ValidationErrors};
use folio_model::FieldPath;
use folio_storage::Sort;
use folio_types::{Actor, VersionId};
use serde_json::Value;

/// Typed query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub depth: Option<usize>,
    pub select: Option<Vec<FieldPath>>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub draft: Option<bool>,
    pub version_id: Option<VersionId>,
    pub locale: Option<String>,
    /// Equality filters from `where[path]=value`.
    pub conditions: Vec<(FieldPath, Value)>,
    /// Paths cleared on purpose, from `clear=a,b.c`.
    pub clear: Vec<FieldPath>,
}

impl QueryParams {
    /// Parses `key=value` pairs as they come off a query string.
    ///
    /// Unknown keys are ignored. Every malformed value is reported, keyed by
    /// the parameter name.
    pub fn from_pairs<I, K, V>(pairs: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        let mut errors = ValidationErrors::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                "depth" => params.depth = number(key, value, &mut errors),
                "limit" => params.limit = number(key, value, &mut errors),
                "offset" => params.offset = number(key, value, &mut errors),
                "draft" => match value {
                    "true" | "1" => params.draft = Some(true),
                    "false" | "0" => params.draft = Some(false),
                    _ => errors.push(FieldError::new(key, "expected true or false")),
                },
                "versionId" => match VersionId::parse(value) {
                    Ok(id) => params.version_id = Some(id),
                    Err(e) => errors.push(FieldError::new(key, e.to_string())),
                },
                "locale" => params.locale = Some(value.to_string()),
                "sort" if !value.is_empty() => params.sort = Some(Sort::parse(value)),
                "select" => match paths(value) {
                    Ok(list) => params.select = Some(list),
                    Err(message) => errors.push(FieldError::new(key, message)),
                },
                "clear" => match paths(value) {
                    Ok(list) => params.clear.extend(list),
                    Err(message) => errors.push(FieldError::new(key, message)),
                },
                _ => {
                    let Some(path) = key.strip_prefix("where[").and_then(|k| k.strip_suffix(']'))
                    else {
                        continue;
                    };
                    match path.parse::<FieldPath>() {
                        Ok(path) if !path.is_empty() => {
                            params.conditions.push((path, condition_value(value)));
                        }
                        _ => errors.push(FieldError::new(key, "invalid field path")),
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(params)
        } else {
            Err(PipelineError::Validation(errors))
        }
    }
}

fn number(key: &str, value: &str, errors: &mut ValidationErrors) -> Option<usize> {
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.push(FieldError::new(key, "expected a non-negative integer"));
            None
        }
    }
}

fn paths(value: &str) -> Result<Vec<FieldPath>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<FieldPath>().map_err(|e| e.to_string()))
        .collect()
}

/// Numbers, booleans and `null` keep their JSON type; anything else is a string.
fn condition_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Who is asking, and with which parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<Actor>,
    pub locale: Option<String>,
    pub params: QueryParams,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn as_actor(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn draft(mut self, draft: bool) -> Self {
        self.params.draft = Some(draft);
        self
    }

    /// The locale parameter wins over the request locale.
    pub fn requested_locale(&self) -> Option<&str> {
        self.params.locale.as_deref().or(self.locale.as_deref())
    }
}
