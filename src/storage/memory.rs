use super::{Document, FindOptions, InsertOutcome, Repository};
use crate::core::{JsonMap, Result, StoreError};
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(1_000).unwrap();

/// Named uniqueness constraint evaluated on insert and update.
pub struct UniqueKey<E> {
    name: &'static str,
    extract: Arc<dyn Fn(&E) -> Option<String> + Send + Sync>,
}

impl<E> UniqueKey<E> {
    /// Documents for which `extract` returns `None` never collide.
    pub fn new(
        name: &'static str,
        extract: impl Fn(&E) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            extract: Arc::new(extract),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Cache counters for the cached read path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
}

struct Documents<E> {
    /// Insertion sequence -> document; gives `find` a stable order.
    entries: BTreeMap<u64, E>,
    ids: HashMap<String, u64>,
    next_seq: u64,
}

impl<E> Default for Documents<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            ids: HashMap::new(),
            next_seq: 0,
        }
    }
}

pub struct InMemoryRepository<E: Document> {
    documents: RwLock<Documents<E>>,
    unique_keys: Vec<UniqueKey<E>>,
    cache: Mutex<LruCache<String, E>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl<E: Document> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl<E: Document> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            documents: RwLock::new(Documents::default()),
            unique_keys: Vec::new(),
            cache: Mutex::new(LruCache::new(capacity)),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn with_unique_key(mut self, key: UniqueKey<E>) -> Self {
        self.unique_keys.push(key);
        self
    }

    pub fn stats(&self) -> RepositoryStats {
        RepositoryStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    fn violated_unique_key(&self, documents: &Documents<E>, candidate: &E) -> Option<&'static str> {
        let own_id = candidate.id();
        self.unique_keys.iter().find_map(|key| {
            let value = (key.extract)(candidate)?;
            let taken = documents.entries.values().any(|existing| {
                existing.id() != own_id && (key.extract)(existing).as_deref() == Some(&value)
            });
            taken.then_some(key.name)
        })
    }

    fn invalidate(&self, id: &str) -> Result<()> {
        self.cache.lock()?.pop(id);
        Ok(())
    }
}

fn to_object<E: Document>(document: &E) -> Result<JsonMap> {
    match serde_json::to_value(document)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "documents in '{}' must serialize to an object, got {other}",
            E::COLLECTION
        ))),
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
impl<E: Document> Repository<E> for InMemoryRepository<E> {
    async fn find(&self, options: FindOptions) -> Result<Vec<E>> {
        let documents = self.documents.read().await;
        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        let needs_json = options.filter != super::DocumentQuery::All || options.fields.is_some();

        let mut page = Vec::new();
        let mut skipped = 0;
        for document in documents.entries.values() {
            if page.len() >= limit {
                break;
            }
            if !needs_json {
                if skipped < options.skip {
                    skipped += 1;
                    continue;
                }
                page.push(document.clone());
                continue;
            }

            let mut object = to_object(document)?;
            if !options.filter.matches(&object) {
                continue;
            }
            if skipped < options.skip {
                skipped += 1;
                continue;
            }
            match &options.fields {
                Some(fields) => {
                    fields.project(&mut object);
                    page.push(serde_json::from_value(Value::Object(object))?);
                }
                None => page.push(document.clone()),
            }
        }
        Ok(page)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<E>> {
        let documents = self.documents.read().await;
        Ok(documents
            .ids
            .get(id)
            .and_then(|seq| documents.entries.get(seq))
            .cloned())
    }

    async fn get_by_id_cached(&self, id: &str) -> Result<Option<E>> {
        if let Some(hit) = self.cache.lock()?.get(id).cloned() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(hit));
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        // Populate while the read guard is held: writers invalidate under the
        // write guard, so a stale copy can never land after a write.
        let documents = self.documents.read().await;
        let found = documents
            .ids
            .get(id)
            .and_then(|seq| documents.entries.get(seq))
            .cloned();
        if let Some(document) = &found {
            self.cache.lock()?.put(id.to_string(), document.clone());
        }
        Ok(found)
    }

    async fn insert(&self, mut document: E) -> Result<InsertOutcome<E>> {
        if let Err(err) = to_object(&document) {
            return Ok(InsertOutcome::Invalid(err.to_string()));
        }

        let mut documents = self.documents.write().await;
        let given_id = document
            .id()
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        match given_id {
            Some(id) if documents.ids.contains_key(&id) => {
                return Ok(InsertOutcome::Conflict(format!(
                    "a document with id '{id}' already exists in '{}'",
                    E::COLLECTION
                )));
            }
            Some(_) => {}
            None => document.set_id(Uuid::new_v4().simple().to_string()),
        }

        if let Some(key) = self.violated_unique_key(&documents, &document) {
            debug!(collection = E::COLLECTION, unique_key = key, "insert rejected by unique key");
            return Ok(InsertOutcome::Conflict(format!(
                "duplicate value for unique key '{key}' in '{}'",
                E::COLLECTION
            )));
        }

        let id = require_id(&document)?;
        let seq = documents.next_seq;
        documents.next_seq += 1;
        documents.ids.insert(id, seq);
        documents.entries.insert(seq, document.clone());
        Ok(InsertOutcome::Inserted(document))
    }

    async fn update(&self, document: E) -> Result<E> {
        let id = require_id(&document)?;
        to_object(&document)?;

        let mut documents = self.documents.write().await;
        let seq = *documents
            .ids
            .get(&id)
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: E::COLLECTION.to_string(),
                id: id.clone(),
            })?;

        if let Some(key) = self.violated_unique_key(&documents, &document) {
            return Err(StoreError::DuplicateKey(format!(
                "duplicate value for unique key '{key}' in '{}'",
                E::COLLECTION
            )));
        }

        documents.entries.insert(seq, document.clone());
        self.invalidate(&id)?;
        Ok(document)
    }

    async fn delete(&self, document: &E) -> Result<()> {
        let id = require_id(document)?;
        let mut documents = self.documents.write().await;
        match documents.ids.remove(&id) {
            Some(seq) => {
                documents.entries.remove(&seq);
            }
            None => debug!(collection = E::COLLECTION, id = %id, "delete of absent document"),
        }
        self.invalidate(&id)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.entries.len())
    }
}
