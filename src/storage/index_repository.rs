use super::index::{IndexStore, RefreshTarget};
use super::index_memory::InMemoryIndexStore;
use super::{Document, FindOptions, InsertOutcome, Repository};
use crate::core::{JsonMap, Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Typed repository over one index of an [`InMemoryIndexStore`].
///
/// The identifier is the document key and is not stored in the source. Every
/// write refreshes the index so the writer's own changes are searchable on
/// return; writes made directly against the store (migrations, bulk updates)
/// stay invisible to `find` until the next refresh, while `get_by_id` always
/// reads the latest version.
pub struct IndexRepository<E> {
    store: Arc<InMemoryIndexStore>,
    index: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Document> IndexRepository<E> {
    pub fn new(store: Arc<InMemoryIndexStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            _entity: PhantomData,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn to_source(document: &E) -> Result<JsonMap> {
        match serde_json::to_value(document)? {
            Value::Object(mut map) => {
                map.remove("id");
                Ok(map)
            }
            other => Err(StoreError::Serialization(format!(
                "documents in '{}' must serialize to an object, got {other}",
                E::COLLECTION
            ))),
        }
    }

    fn from_source(id: String, source: JsonMap) -> Result<E> {
        let mut document: E = serde_json::from_value(Value::Object(source))?;
        document.set_id(id);
        Ok(document)
    }

    async fn refresh(&self) -> Result<()> {
        self.store
            .refresh(RefreshTarget::Index(self.index.clone()))
            .await
    }
}

fn require_id<E: Document>(document: &E) -> Result<String> {
    match document.id() {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StoreError::Execution(format!(
            "document in '{}' has no identifier",
            E::COLLECTION
        ))),
    }
}

#[async_trait]
impl<E: Document> Repository<E> for IndexRepository<E> {
    async fn find(&self, options: FindOptions) -> Result<Vec<E>> {
        let hits = self
            .store
            .search(&self.index, &options.filter, options.skip, options.limit)
            .await?;
        hits.into_iter()
            .map(|(id, mut source)| {
                if let Some(fields) = &options.fields {
                    fields.project(&mut source);
                }
                Self::from_source(id, source)
            })
            .collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<E>> {
        self.store
            .get_document(&self.index, id)
            .await?
            .map(|source| Self::from_source(id.to_string(), source))
            .transpose()
    }

    async fn insert(&self, mut document: E) -> Result<InsertOutcome<E>> {
        let source = match Self::to_source(&document) {
            Ok(source) => source,
            Err(err) => return Ok(InsertOutcome::Invalid(err.to_string())),
        };
        let id = match document.id().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };

        match self.store.create_document(&self.index, &id, source).await {
            Ok(true) => {}
            Ok(false) => {
                return Ok(InsertOutcome::Conflict(format!(
                    "a document with id '{id}' already exists in '{}'",
                    self.index
                )));
            }
            Err(StoreError::Mapping(reason)) => return Ok(InsertOutcome::Invalid(reason)),
            Err(err) => return Err(err),
        }
        self.refresh().await?;

        document.set_id(id);
        Ok(InsertOutcome::Inserted(document))
    }

    async fn update(&self, document: E) -> Result<E> {
        let id = require_id(&document)?;
        let source = Self::to_source(&document)?;
        if !self.store.replace_document(&self.index, &id, source).await? {
            return Err(StoreError::DocumentNotFound {
                collection: E::COLLECTION.to_string(),
                id,
            });
        }
        self.refresh().await?;
        Ok(document)
    }

    async fn delete(&self, document: &E) -> Result<()> {
        let id = require_id(document)?;
        if !self.store.delete_document(&self.index, &id).await? {
            debug!(index = %self.index, id = %id, "delete of absent document");
        }
        self.refresh().await
    }

    async fn count(&self) -> Result<usize> {
        self.store.document_count(&self.index).await
    }
}
