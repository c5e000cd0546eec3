//! Generic list/get/create/patch/delete over any [`Resource`].
//!
//! A concrete resource supplies its repository and projection mapper and
//! overrides only the hooks it cares about; the operations themselves live in
//! [`ResourceController`] and are written once.

use super::changeset::ChangeSet;
use super::error::{ResourceError, ResourceResult};
use super::mapper::ProjectionMapper;
use super::paging::{PageRequest, PagedResult};
use crate::core::Result as StoreResult;
use crate::storage::{Document, DocumentQuery, FieldSet, FindOptions, InsertOutcome, Repository};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extension points of a resource. Every method except `repository` and
/// `mapper` has a default.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Entity: Document;
    type View: Serialize + Send + Sync + 'static;

    fn repository(&self) -> &dyn Repository<Self::Entity>;

    fn mapper(&self) -> &ProjectionMapper<Self::Entity, Self::View>;

    /// Fetch strategy shared by get, patch and delete. An absent or empty id
    /// never reaches the store.
    async fn get_model(&self, id: Option<&str>) -> StoreResult<Option<Self::Entity>> {
        match id {
            Some(id) if !id.is_empty() => self.repository().get_by_id_cached(id).await,
            _ => Ok(None),
        }
    }

    fn list_filter(&self) -> DocumentQuery {
        DocumentQuery::All
    }

    fn list_fields(&self) -> Option<FieldSet> {
        None
    }

    fn can_add(&self, value: &Self::Entity) -> bool {
        value.is_new()
    }

    async fn add_model(&self, value: Self::Entity) -> StoreResult<InsertOutcome<Self::Entity>> {
        self.repository().insert(value).await
    }

    fn updatable_property_names(&self) -> &[&'static str] {
        &[]
    }

    /// Rejects the whole change set if any changed property is not updatable.
    fn can_update(&self, original: &Self::Entity, changes: &ChangeSet) -> ResourceResult<()> {
        let allowed = self.updatable_property_names();
        let rejected: Vec<String> = changes
            .changed_property_names(original)?
            .into_iter()
            .filter(|name| !allowed.iter().any(|candidate| *candidate == name.as_str()))
            .collect();

        if rejected.is_empty() {
            return Ok(());
        }
        Err(ResourceError::bad_request(format!(
            "The following properties can't be changed: {}",
            rejected.join(", ")
        )))
    }

    /// Applies `changes` to `original` and replaces the stored entity. The
    /// identifier of `original` is kept.
    async fn update_model(
        &self,
        original: Self::Entity,
        changes: &ChangeSet,
    ) -> ResourceResult<Self::Entity> {
        let mut patched = changes.apply(&original).map_err(|err| {
            ResourceError::bad_request(format!("The changes could not be applied: {err}"))
        })?;
        if let Some(id) = original.id() {
            patched.set_id(id.to_string());
        }
        Ok(self.repository().update(patched).await?)
    }

    fn can_delete(&self, _value: &Self::Entity) -> bool {
        true
    }

    async fn delete_model(&self, value: &Self::Entity) -> StoreResult<()> {
        self.repository().delete(value).await
    }
}

/// Reference to a newly created entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Empty change set; storage untouched.
    NoOp,
    Applied,
}

pub struct ResourceController<R: Resource> {
    resource: Arc<R>,
    base_path: Arc<str>,
}

impl<R: Resource> Clone for ResourceController<R> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            base_path: Arc::clone(&self.base_path),
        }
    }
}

impl<R: Resource> ResourceController<R> {
    /// `base_path` is the public path the resource is mounted at, used to
    /// build `Location` references.
    pub fn new(resource: R, base_path: &str) -> Self {
        Self::from_arc(Arc::new(resource), base_path)
    }

    pub fn from_arc(resource: Arc<R>, base_path: &str) -> Self {
        Self {
            resource,
            base_path: Arc::from(base_path.trim_end_matches('/')),
        }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn location_of(&self, id: &str) -> String {
        format!("{}/{id}", self.base_path)
    }

    fn collection(&self) -> &'static str {
        R::Entity::COLLECTION
    }

    pub async fn list(&self, page: PageRequest) -> ResourceResult<PagedResult<R::View>> {
        let options = FindOptions::page(page.skip(), page.limit())
            .filter(self.resource.list_filter())
            .fields(self.resource.list_fields());

        let entities = self.resource.repository().find(options).await?;
        debug!(
            collection = self.collection(),
            page = page.page(),
            page_size = page.page_size(),
            returned = entities.len(),
            "listed resources"
        );

        let results = self.resource.mapper().map_all(entities);
        Ok(PagedResult::new(results, page))
    }

    pub async fn get(&self, id: Option<&str>) -> ResourceResult<R::View> {
        let entity = self
            .resource
            .get_model(id)
            .await?
            .ok_or(ResourceError::NotFound)?;
        Ok(self.resource.mapper().map(entity))
    }

    pub async fn create(&self, value: Option<R::Entity>) -> ResourceResult<Created> {
        let value = value.ok_or_else(|| ResourceError::bad_request("A request body is required"))?;

        if !self.resource.can_add(&value) {
            debug!(collection = self.collection(), "add declined by policy");
            return Err(ResourceError::NotFound);
        }

        match self.resource.add_model(value).await? {
            InsertOutcome::Inserted(model) => {
                let id = model
                    .id()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        crate::core::StoreError::Execution(format!(
                            "insert into '{}' returned a document without identifier",
                            self.collection()
                        ))
                    })?
                    .to_string();
                info!(collection = self.collection(), id = %id, "resource created");
                Ok(Created {
                    location: self.location_of(&id),
                    id,
                })
            }
            InsertOutcome::Conflict(reason) => {
                warn!(collection = self.collection(), %reason, "insert conflict");
                Err(ResourceError::Conflict)
            }
            InsertOutcome::Invalid(reason) => {
                warn!(collection = self.collection(), %reason, "insert rejected by store");
                Err(ResourceError::BadRequest(reason))
            }
        }
    }

    pub async fn patch(&self, id: Option<&str>, changes: ChangeSet) -> ResourceResult<PatchOutcome> {
        if changes.is_empty() {
            return Ok(PatchOutcome::NoOp);
        }

        let original = self
            .resource
            .get_model(id)
            .await?
            .ok_or(ResourceError::NotFound)?;

        if let Err(err) = self.resource.can_update(&original, &changes) {
            debug!(collection = self.collection(), error = %err, "update declined");
            return Err(err);
        }

        self.resource.update_model(original, &changes).await?;
        debug!(
            collection = self.collection(),
            properties = changes.len(),
            "resource patched"
        );
        Ok(PatchOutcome::Applied)
    }

    /// A missing entity is a 400 here, not a 404.
    pub async fn delete(&self, id: Option<&str>) -> ResourceResult<()> {
        let Some(item) = self.resource.get_model(id).await? else {
            return Err(ResourceError::bad_request("The resource to delete could not be found"));
        };

        if !self.resource.can_delete(&item) {
            debug!(collection = self.collection(), "delete declined by policy");
            return Err(ResourceError::Unauthorized);
        }

        self.resource.delete_model(&item).await?;
        info!(collection = self.collection(), id = item.id().unwrap_or_default(), "resource deleted");
        Ok(())
    }
}
