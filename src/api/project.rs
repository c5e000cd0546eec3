use crate::core::Result as StoreResult;
use crate::resource::{ProjectionMapper, Resource};
use crate::storage::{Document, InsertOutcome, Repository, UniqueKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub organization_id: String,
    pub name: String,
    pub delete_bot_data_enabled: bool,
    /// Internal; never projected.
    pub api_keys: Vec<String>,
    pub created_utc: Option<DateTime<Utc>>,
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Public shape of a [`Project`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub delete_bot_data_enabled: bool,
    pub created_utc: Option<DateTime<Utc>>,
}

impl From<Project> for ProjectView {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.unwrap_or_default(),
            organization_id: project.organization_id,
            name: project.name,
            delete_bot_data_enabled: project.delete_bot_data_enabled,
            created_utc: project.created_utc,
        }
    }
}

/// Project names are unique per organization, case-insensitively.
pub fn project_name_key() -> UniqueKey<Project> {
    UniqueKey::new("organization_id+name", |project: &Project| {
        Some(format!(
            "{}/{}",
            project.organization_id,
            project.name.to_lowercase()
        ))
    })
}

pub struct ProjectResource {
    repository: Arc<dyn Repository<Project>>,
    mapper: ProjectionMapper<Project, ProjectView>,
}

impl ProjectResource {
    pub fn new(repository: Arc<dyn Repository<Project>>) -> Self {
        Self {
            repository,
            mapper: ProjectionMapper::via_from(),
        }
    }
}

#[async_trait]
impl Resource for ProjectResource {
    type Entity = Project;
    type View = ProjectView;

    fn repository(&self) -> &dyn Repository<Project> {
        self.repository.as_ref()
    }

    fn mapper(&self) -> &ProjectionMapper<Project, ProjectView> {
        &self.mapper
    }

    fn can_add(&self, value: &Project) -> bool {
        value.is_new() && !value.organization_id.is_empty() && !value.name.trim().is_empty()
    }

    async fn add_model(&self, mut value: Project) -> StoreResult<InsertOutcome<Project>> {
        value.created_utc = Some(Utc::now());
        self.repository.insert(value).await
    }

    fn updatable_property_names(&self) -> &[&'static str] {
        &["name", "delete_bot_data_enabled"]
    }
}
