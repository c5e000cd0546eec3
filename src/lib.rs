// ============================================================================
// repoapi Library
// ============================================================================

pub mod api;
pub mod config;
pub mod core;
pub mod migrations;
pub mod resource;
pub mod storage;
pub mod web;

pub use core::{JsonMap, Result, StoreError};

pub use resource::{
    ChangeSet, Created, PageQuery, PageRequest, PagedResult, PatchOutcome, ProjectionMapper,
    Resource, ResourceController, ResourceError, ResourceResult,
};

pub use storage::{
    Document, DocumentQuery, FieldSet, FindOptions, InMemoryIndexStore, InMemoryRepository,
    IndexMapping, IndexRepository, IndexStore, InsertOutcome, RefreshTarget, Repository,
    UniqueKey, UpdateScript,
};

pub use migrations::{Migration, MigrationReport, SetStackStatus};

pub use web::resource_router;
