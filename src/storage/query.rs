//! Document filters and field projections shared by the repository and the
//! index store.
//!
//! Filters use a small query-string dialect:
//!
//! | clause            | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `*`               | every document                            |
//! | `_missing_:field` | `field` is absent or `null`               |
//! | `_exists_:field`  | `field` is present and not `null`         |
//! | `field:value`     | `field` equals `value` (or contains it)   |
//!
//! Clauses are combined with ` AND `. Field names may be dotted paths into
//! nested objects.

use crate::core::{JsonMap, Result, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

const MISSING_PREFIX: &str = "_missing_:";
const EXISTS_PREFIX: &str = "_exists_:";
const AND_SEPARATOR: &str = " AND ";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DocumentQuery {
    #[default]
    All,
    Missing(String),
    Exists(String),
    Term { field: String, value: Value },
    And(Vec<DocumentQuery>),
}

impl DocumentQuery {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(field.into())
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: DocumentQuery) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Parses the query-string dialect described in the module docs.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::All);
        }

        let mut clauses = trimmed
            .split(AND_SEPARATOR)
            .map(parse_clause)
            .collect::<Result<Vec<_>>>()?;

        if clauses.len() == 1 {
            return Ok(clauses.remove(0));
        }
        Ok(Self::And(clauses))
    }

    /// Rewrites field names through an alias table (`alias -> path`).
    pub fn resolve_aliases(&self, aliases: &HashMap<String, String>) -> Self {
        let resolve = |field: &String| aliases.get(field).unwrap_or(field).clone();
        match self {
            Self::All => Self::All,
            Self::Missing(field) => Self::Missing(resolve(field)),
            Self::Exists(field) => Self::Exists(resolve(field)),
            Self::Term { field, value } => Self::Term {
                field: resolve(field),
                value: value.clone(),
            },
            Self::And(clauses) => Self::And(
                clauses
                    .iter()
                    .map(|clause| clause.resolve_aliases(aliases))
                    .collect(),
            ),
        }
    }

    pub fn matches(&self, document: &JsonMap) -> bool {
        match self {
            Self::All => true,
            Self::Missing(field) => lookup(document, field).is_none_or(Value::is_null),
            Self::Exists(field) => lookup(document, field).is_some_and(|value| !value.is_null()),
            Self::Term { field, value } => match lookup(document, field) {
                Some(Value::Array(items)) => items.contains(value),
                Some(found) => found == value,
                None => false,
            },
            Self::And(clauses) => clauses.iter().all(|clause| clause.matches(document)),
        }
    }
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Missing(field) => write!(f, "{MISSING_PREFIX}{field}"),
            Self::Exists(field) => write!(f, "{EXISTS_PREFIX}{field}"),
            Self::Term {
                field,
                value: Value::String(text),
            } => write!(f, "{field}:{text}"),
            Self::Term { field, value } => write!(f, "{field}:{value}"),
            Self::And(clauses) => {
                for (position, clause) in clauses.iter().enumerate() {
                    if position > 0 {
                        f.write_str(AND_SEPARATOR)?;
                    }
                    write!(f, "{clause}")?;
                }
                Ok(())
            }
        }
    }
}

fn parse_clause(raw: &str) -> Result<DocumentQuery> {
    let clause = raw.trim();
    if clause == "*" {
        return Ok(DocumentQuery::All);
    }
    if let Some(field) = clause.strip_prefix(MISSING_PREFIX) {
        return Ok(DocumentQuery::Missing(parse_field(field, clause)?));
    }
    if let Some(field) = clause.strip_prefix(EXISTS_PREFIX) {
        return Ok(DocumentQuery::Exists(parse_field(field, clause)?));
    }

    let (field, value) = clause
        .split_once(':')
        .ok_or_else(|| StoreError::InvalidQuery(format!("expected 'field:value' in '{clause}'")))?;

    Ok(DocumentQuery::Term {
        field: parse_field(field, clause)?,
        value: parse_value(value.trim()),
    })
}

fn parse_field(field: &str, clause: &str) -> Result<String> {
    let field = field.trim();
    if field.is_empty() {
        return Err(StoreError::InvalidQuery(format!(
            "missing field name in '{clause}'"
        )));
    }
    Ok(field.to_string())
}

fn parse_value(raw: &str) -> Value {
    if let Some(quoted) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Value::String(quoted.to_string());
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => serde_json::from_str::<serde_json::Number>(raw)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

/// Looks up a dotted path in a JSON document.
pub fn lookup<'a>(document: &'a JsonMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Subset of top-level fields returned by a projected find.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    fields: Vec<String>,
}

impl FieldSet {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for field in fields {
            let field = field.into();
            if !set.fields.contains(&field) {
                set.fields.push(field);
            }
        }
        set
    }

    pub fn includes(&self, field: &str) -> bool {
        self.fields.iter().any(|candidate| candidate == field)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Drops every field not in the set. `id` is always kept.
    pub fn project(&self, document: &mut JsonMap) {
        document.retain(|key, _| key == "id" || self.includes(key));
    }
}
