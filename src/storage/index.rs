//! Index-level operations: field mappings, refresh and scripted
//! update-by-query.

use super::DocumentQuery;
use crate::core::{JsonMap, Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Field type in an index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMapping {
    Keyword,
    Text,
    Date,
    Boolean,
    Long,
}

/// Field mappings plus query-time aliases (`alias -> path`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    pub properties: BTreeMap<String, FieldMapping>,
    pub aliases: HashMap<String, String>,
}

impl IndexMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.properties.insert(name.into(), mapping);
        self
    }

    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.field(name, FieldMapping::Keyword)
    }

    pub fn date(self, name: impl Into<String>) -> Self {
        self.field(name, FieldMapping::Date)
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, FieldMapping::Boolean)
    }

    pub fn alias(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), path.into());
        self
    }

    pub fn mapping_of(&self, field: &str) -> Option<FieldMapping> {
        self.properties.get(field).copied()
    }

    /// Merges `update` into `self`.
    ///
    /// Existing fields may not change type, and every alias must point to a
    /// mapped field (after the merge) that is not itself an alias.
    pub fn merge(&mut self, update: &IndexMapping) -> Result<()> {
        for (name, mapping) in &update.properties {
            if let Some(existing) = self.properties.get(name)
                && existing != mapping
            {
                return Err(StoreError::Mapping(format!(
                    "field '{name}' is mapped as {existing:?} and cannot change to {mapping:?}"
                )));
            }
        }

        let mut merged = self.clone();
        for (name, mapping) in &update.properties {
            merged.properties.insert(name.clone(), *mapping);
        }
        for (alias, path) in &update.aliases {
            if merged.properties.contains_key(alias) {
                return Err(StoreError::Mapping(format!(
                    "alias '{alias}' collides with a mapped field"
                )));
            }
            if !merged.properties.contains_key(path) {
                return Err(StoreError::Mapping(format!(
                    "alias '{alias}' points to unmapped field '{path}'"
                )));
            }
            merged.aliases.insert(alias.clone(), path.clone());
        }

        *self = merged;
        Ok(())
    }
}

/// Which indices a refresh applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    All,
    Index(String),
}

/// What a script did to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    Updated,
    Noop,
}

/// Per-document mutation run by [`IndexStore::update_by_query`].
pub trait UpdateScript: Send + Sync {
    /// Script text in the store's native language. Stores that execute scripts
    /// server-side send this; the in-memory store calls [`UpdateScript::apply`].
    fn source(&self) -> &str;

    /// Mutates one document source. An `Err` is recorded as a failure for that
    /// document only.
    fn apply(&self, source: &mut JsonMap) -> std::result::Result<ScriptOutcome, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateByQueryFailure {
    pub index: String,
    pub id: String,
    pub reason: String,
}

/// Aggregate result of an update-by-query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateByQueryResponse {
    /// Documents matched by the query.
    pub total: u64,
    pub updated: u64,
    pub noops: u64,
    pub failures: Vec<UpdateByQueryFailure>,
}

#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn put_mapping(&self, index: &str, mapping: &IndexMapping) -> Result<()>;

    async fn refresh(&self, target: RefreshTarget) -> Result<()>;

    /// Runs `script` over every visible document of `index` matching `query`.
    async fn update_by_query(
        &self,
        index: &str,
        query: &DocumentQuery,
        script: &dyn UpdateScript,
    ) -> Result<UpdateByQueryResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_fields_and_aliases() {
        let mut mapping = IndexMapping::new().keyword("type");
        mapping
            .merge(
                &IndexMapping::new()
                    .keyword("status")
                    .boolean("is_deleted")
                    .alias("deleted", "is_deleted"),
            )
            .unwrap();

        assert_eq!(mapping.mapping_of("type"), Some(FieldMapping::Keyword));
        assert_eq!(mapping.mapping_of("is_deleted"), Some(FieldMapping::Boolean));
        assert_eq!(mapping.aliases.get("deleted").map(String::as_str), Some("is_deleted"));
    }

    #[test]
    fn merge_is_idempotent() {
        let update = IndexMapping::new().date("snooze_until_utc");
        let mut mapping = IndexMapping::new();
        mapping.merge(&update).unwrap();
        mapping.merge(&update).unwrap();
        assert_eq!(mapping, update);
    }

    #[test]
    fn merge_rejects_type_changes_and_dangling_aliases() {
        let mut mapping = IndexMapping::new().keyword("status");
        let before = mapping.clone();

        assert!(matches!(
            mapping.merge(&IndexMapping::new().boolean("status")),
            Err(StoreError::Mapping(_))
        ));
        assert!(matches!(
            mapping.merge(&IndexMapping::new().date("other").alias("gone", "missing")),
            Err(StoreError::Mapping(_))
        ));
        assert_eq!(mapping, before);
    }
}
