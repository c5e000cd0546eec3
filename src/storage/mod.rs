//! Storage accessors over the document store.
//!
//! Two seams live here: [`Repository`] for typed entity CRUD used by the
//! resource controllers, and [`IndexStore`] for index-wide mapping changes and
//! scripted bulk updates used by migrations. Both ship with in-memory
//! implementations, and [`IndexRepository`] puts a typed repository on top of
//! an index so that resources and migrations can share one store.

pub mod index;
pub mod index_memory;
pub mod index_repository;
pub mod memory;
pub mod query;

use crate::core::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use index::{
    FieldMapping, IndexMapping, IndexStore, RefreshTarget, ScriptOutcome, UpdateByQueryFailure,
    UpdateByQueryResponse, UpdateScript,
};
pub use index_memory::InMemoryIndexStore;
pub use index_repository::IndexRepository;
pub use memory::{InMemoryRepository, UniqueKey};
pub use query::{DocumentQuery, FieldSet};

/// A persisted record with a store-assigned identifier.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the documents are stored in.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// `true` when the identifier is absent or empty.
    fn is_new(&self) -> bool {
        self.id().is_none_or(str::is_empty)
    }
}

/// Window and shape of a `find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: DocumentQuery,
    pub fields: Option<FieldSet>,
    pub skip: usize,
    pub limit: usize,
}

impl FindOptions {
    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: DocumentQuery) -> Self {
        self.filter = filter;
        self
    }

    pub fn fields(mut self, fields: Option<FieldSet>) -> Self {
        self.fields = fields;
        self
    }
}

/// Result of an insert. Conflicts are part of the signature instead of an
/// error the caller has to recognise.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<E> {
    Inserted(E),
    /// Uniqueness or write conflict detected by the store.
    Conflict(String),
    /// The store refused the document as malformed.
    Invalid(String),
}

#[async_trait]
pub trait Repository<E: Document>: Send + Sync {
    async fn find(&self, options: FindOptions) -> Result<Vec<E>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<E>>;

    /// Read path that may be served from a cache. Stores without a cache fall
    /// back to [`Repository::get_by_id`].
    async fn get_by_id_cached(&self, id: &str) -> Result<Option<E>> {
        self.get_by_id(id).await
    }

    /// Inserts a new document; the store assigns its identifier.
    async fn insert(&self, document: E) -> Result<InsertOutcome<E>>;

    /// Replaces the stored document with the same identifier.
    async fn update(&self, document: E) -> Result<E>;

    async fn delete(&self, document: &E) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}
