use super::index::{
    FieldMapping, IndexMapping, IndexStore, RefreshTarget, ScriptOutcome, UpdateByQueryFailure,
    UpdateByQueryResponse, UpdateScript,
};
use super::DocumentQuery;
use crate::core::{JsonMap, Result, StoreError};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// One index. Writes land in `live`; queries only see `searchable`, which is
/// replaced by `live` on refresh. Mapping updates follow the same rule.
#[derive(Default)]
struct IndexState {
    mapping: IndexMapping,
    pending_mapping: Option<IndexMapping>,
    live: BTreeMap<String, JsonMap>,
    searchable: BTreeMap<String, JsonMap>,
}

impl IndexState {
    fn effective_mapping(&self) -> &IndexMapping {
        self.pending_mapping.as_ref().unwrap_or(&self.mapping)
    }

    fn refresh(&mut self) {
        if let Some(mapping) = self.pending_mapping.take() {
            self.mapping = mapping;
        }
        self.searchable = self.live.clone();
    }
}

/// In-memory index store with near-real-time visibility.
#[derive(Default)]
pub struct InMemoryIndexStore {
    indices: RwLock<HashMap<String, IndexState>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_index(&self, name: &str, mapping: IndexMapping) -> Result<()> {
        let mut indices = self.indices.write().await;
        if indices.contains_key(name) {
            return Err(StoreError::Execution(format!("index '{name}' already exists")));
        }
        indices.insert(
            name.to_string(),
            IndexState {
                mapping,
                ..IndexState::default()
            },
        );
        Ok(())
    }

    /// Writes a document. It becomes visible to queries after the next refresh.
    pub async fn index_document(&self, index: &str, id: &str, source: JsonMap) -> Result<()> {
        let mut indices = self.indices.write().await;
        let state = index_mut(&mut indices, index)?;
        check_document(state.effective_mapping(), &source).map_err(StoreError::Mapping)?;
        state.live.insert(id.to_string(), source);
        Ok(())
    }

    /// Writes a document only if `id` is not taken. Returns `false` when it is.
    pub async fn create_document(&self, index: &str, id: &str, source: JsonMap) -> Result<bool> {
        let mut indices = self.indices.write().await;
        let state = index_mut(&mut indices, index)?;
        if state.live.contains_key(id) {
            return Ok(false);
        }
        check_document(state.effective_mapping(), &source).map_err(StoreError::Mapping)?;
        state.live.insert(id.to_string(), source);
        Ok(true)
    }

    /// Replaces an existing document. Returns `false` when `id` is unknown.
    pub async fn replace_document(&self, index: &str, id: &str, source: JsonMap) -> Result<bool> {
        let mut indices = self.indices.write().await;
        let state = index_mut(&mut indices, index)?;
        let Some(current) = state.live.get_mut(id) else {
            return Ok(false);
        };
        check_document(
            state.pending_mapping.as_ref().unwrap_or(&state.mapping),
            &source,
        )
        .map_err(StoreError::Mapping)?;
        *current = source;
        Ok(true)
    }

    /// Latest written version of a document, refreshed or not.
    pub async fn get_document(&self, index: &str, id: &str) -> Result<Option<JsonMap>> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        Ok(state.live.get(id).cloned())
    }

    /// Removes a document. Returns whether it existed; searches keep seeing it
    /// until the next refresh.
    pub async fn delete_document(&self, index: &str, id: &str) -> Result<bool> {
        let mut indices = self.indices.write().await;
        Ok(index_mut(&mut indices, index)?.live.remove(id).is_some())
    }

    /// Searchable documents matching `query`, ordered by id, after skipping
    /// `skip` matches. A `limit` of 0 means no limit.
    pub async fn search(
        &self,
        index: &str,
        query: &DocumentQuery,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<(String, JsonMap)>> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        let query = query.resolve_aliases(&state.mapping.aliases);
        let limit = if limit == 0 { usize::MAX } else { limit };
        Ok(state
            .searchable
            .iter()
            .filter(|(_, source)| query.matches(source))
            .skip(skip)
            .take(limit)
            .map(|(id, source)| (id.clone(), source.clone()))
            .collect())
    }

    /// Number of written documents, refreshed or not.
    pub async fn document_count(&self, index: &str) -> Result<usize> {
        let indices = self.indices.read().await;
        indices
            .get(index)
            .map(|state| state.live.len())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    /// Mapping currently used by queries.
    pub async fn mapping(&self, index: &str) -> Result<IndexMapping> {
        let indices = self.indices.read().await;
        indices
            .get(index)
            .map(|state| state.mapping.clone())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    /// Counts searchable documents matching `query`.
    pub async fn count(&self, index: &str, query: &DocumentQuery) -> Result<usize> {
        let indices = self.indices.read().await;
        let state = indices
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        let query = query.resolve_aliases(&state.mapping.aliases);
        Ok(state
            .searchable
            .values()
            .filter(|source| query.matches(source))
            .count())
    }
}

fn index_mut<'a>(
    indices: &'a mut HashMap<String, IndexState>,
    index: &str,
) -> Result<&'a mut IndexState> {
    indices
        .get_mut(index)
        .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
}

/// Checks mapped fields of `source` against their declared types. Unmapped
/// fields are accepted as-is.
fn check_document(mapping: &IndexMapping, source: &JsonMap) -> std::result::Result<(), String> {
    for (field, kind) in &mapping.properties {
        let Some(value) = source.get(field) else {
            continue;
        };
        let valid = match (kind, value) {
            (_, Value::Null) => true,
            (FieldMapping::Keyword | FieldMapping::Text, Value::String(_)) => true,
            (FieldMapping::Keyword | FieldMapping::Text, Value::Array(items)) => {
                items.iter().all(Value::is_string)
            }
            (FieldMapping::Boolean, Value::Bool(_)) => true,
            (FieldMapping::Long, Value::Number(number)) => number.is_i64(),
            (FieldMapping::Date, Value::String(text)) => DateTime::parse_from_rfc3339(text).is_ok(),
            _ => false,
        };
        if !valid {
            return Err(format!(
                "failed to parse field [{field}] of type [{kind:?}] from value {value}"
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn put_mapping(&self, index: &str, mapping: &IndexMapping) -> Result<()> {
        let mut indices = self.indices.write().await;
        let state = index_mut(&mut indices, index)?;
        let mut merged = state.effective_mapping().clone();
        merged.merge(mapping)?;
        state.pending_mapping = Some(merged);
        debug!(index, fields = mapping.properties.len(), "mapping staged");
        Ok(())
    }

    async fn refresh(&self, target: RefreshTarget) -> Result<()> {
        let mut indices = self.indices.write().await;
        match target {
            RefreshTarget::All => {
                for state in indices.values_mut() {
                    state.refresh();
                }
                debug!(indices = indices.len(), "refreshed all indices");
            }
            RefreshTarget::Index(name) => {
                index_mut(&mut indices, &name)?.refresh();
                debug!(index = %name, "refreshed index");
            }
        }
        Ok(())
    }

    async fn update_by_query(
        &self,
        index: &str,
        query: &DocumentQuery,
        script: &dyn UpdateScript,
    ) -> Result<UpdateByQueryResponse> {
        let mut indices = self.indices.write().await;
        let state = index_mut(&mut indices, index)?;
        let query = query.resolve_aliases(&state.mapping.aliases);

        let matched: Vec<String> = state
            .searchable
            .iter()
            .filter(|(_, source)| query.matches(source))
            .map(|(id, _)| id.clone())
            .collect();

        let mut response = UpdateByQueryResponse {
            total: matched.len() as u64,
            ..UpdateByQueryResponse::default()
        };

        for id in matched {
            let failure = |reason: String| UpdateByQueryFailure {
                index: index.to_string(),
                id: id.clone(),
                reason,
            };

            let Some(current) = state.live.get(&id) else {
                response
                    .failures
                    .push(failure("document was deleted after the last refresh".to_string()));
                continue;
            };

            let mut source = current.clone();
            match script.apply(&mut source) {
                Ok(ScriptOutcome::Updated) => match check_document(&state.mapping, &source) {
                    Ok(()) => {
                        state.live.insert(id.clone(), source);
                        response.updated += 1;
                    }
                    Err(reason) => response.failures.push(failure(reason)),
                },
                Ok(ScriptOutcome::Noop) => response.noops += 1,
                Err(reason) => response.failures.push(failure(reason)),
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SetField(&'static str, Value);

    impl UpdateScript for SetField {
        fn source(&self) -> &str {
            "ctx._source[params.field] = params.value"
        }

        fn apply(&self, source: &mut JsonMap) -> std::result::Result<ScriptOutcome, String> {
            if source.get("poison") == Some(&Value::Bool(true)) {
                return Err("poisoned document".to_string());
            }
            source.insert(self.0.to_string(), self.1.clone());
            Ok(ScriptOutcome::Updated)
        }
    }

    fn source(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    async fn store_with(docs: &[(&str, Value)]) -> InMemoryIndexStore {
        let store = InMemoryIndexStore::new();
        store.create_index("items", IndexMapping::new()).await.unwrap();
        for (id, doc) in docs {
            store
                .index_document("items", id, source(doc.clone()))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn documents_are_only_searchable_after_refresh() {
        let store = store_with(&[("1", json!({ "a": 1 }))]).await;
        assert_eq!(store.count("items", &DocumentQuery::All).await.unwrap(), 0);

        store.refresh(RefreshTarget::All).await.unwrap();
        assert_eq!(store.count("items", &DocumentQuery::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn aliases_resolve_once_the_mapping_is_refreshed() {
        let store = store_with(&[("1", json!({ "is_deleted": true }))]).await;
        store
            .put_mapping(
                "items",
                &IndexMapping::new()
                    .boolean("is_deleted")
                    .alias("deleted", "is_deleted"),
            )
            .await
            .unwrap();

        let by_alias = DocumentQuery::parse("deleted:true").unwrap();
        assert!(store.mapping("items").await.unwrap().aliases.is_empty());

        store.refresh(RefreshTarget::Index("items".to_string())).await.unwrap();
        assert_eq!(store.count("items", &by_alias).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_by_query_counts_failures_without_aborting() {
        let store = store_with(&[
            ("1", json!({})),
            ("2", json!({ "poison": true })),
            ("3", json!({ "status": "open" })),
            ("4", json!({})),
        ])
        .await;
        store.refresh(RefreshTarget::All).await.unwrap();

        let response = store
            .update_by_query(
                "items",
                &DocumentQuery::missing("status"),
                &SetField("status", json!("new")),
            )
            .await
            .unwrap();

        assert_eq!(response.total, 3);
        assert_eq!(response.updated, 2);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].id, "2");
        assert_eq!(
            store.get_document("items", "4").await.unwrap(),
            Some(source(json!({ "status": "new" })))
        );
        assert_eq!(
            store.get_document("items", "3").await.unwrap(),
            Some(source(json!({ "status": "open" })))
        );
    }

    #[tokio::test]
    async fn script_results_violating_the_mapping_are_failures() {
        let store = store_with(&[("1", json!({}))]).await;
        store
            .put_mapping("items", &IndexMapping::new().boolean("flag"))
            .await
            .unwrap();
        store.refresh(RefreshTarget::All).await.unwrap();

        let response = store
            .update_by_query("items", &DocumentQuery::All, &SetField("flag", json!("yes")))
            .await
            .unwrap();

        assert_eq!(response.updated, 0);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(store.get_document("items", "1").await.unwrap(), Some(JsonMap::new()));
    }

    #[tokio::test]
    async fn unknown_index_is_an_error() {
        let store = InMemoryIndexStore::new();
        assert!(matches!(
            store.refresh(RefreshTarget::Index("nope".to_string())).await,
            Err(StoreError::IndexNotFound(_))
        ));
        assert!(matches!(
            store.put_mapping("nope", &IndexMapping::new()).await,
            Err(StoreError::IndexNotFound(_))
        ));
    }
}
