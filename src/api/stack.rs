use crate::resource::{ProjectionMapper, Resource};
use crate::storage::{Document, DocumentQuery, Repository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Open,
    Fixed,
    Regressed,
    Snoozed,
    Ignored,
    Discarded,
}

impl StackStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Fixed => "fixed",
            Self::Regressed => "regressed",
            Self::Snoozed => "snoozed",
            Self::Ignored => "ignored",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of similar events. The `is_*` and `disable_notifications` flags
/// predate `status` and are kept for older documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<StackStatus>,
    pub snooze_until_utc: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub total_occurrences: u64,
    pub occurrences_are_critical: bool,
    pub is_deleted: bool,
    pub is_regressed: bool,
    pub is_hidden: bool,
    pub disable_notifications: bool,
    pub is_fixed: bool,
}

impl Document for Stack {
    const COLLECTION: &'static str = "stacks";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

pub struct StackResource {
    repository: Arc<dyn Repository<Stack>>,
    mapper: ProjectionMapper<Stack, Stack>,
}

impl StackResource {
    pub fn new(repository: Arc<dyn Repository<Stack>>) -> Self {
        Self {
            repository,
            mapper: ProjectionMapper::identity(),
        }
    }
}

impl Resource for StackResource {
    type Entity = Stack;
    type View = Stack;

    fn repository(&self) -> &dyn Repository<Stack> {
        self.repository.as_ref()
    }

    fn mapper(&self) -> &ProjectionMapper<Stack, Stack> {
        &self.mapper
    }

    /// Soft-deleted stacks are hidden from listings.
    fn list_filter(&self) -> DocumentQuery {
        DocumentQuery::term("is_deleted", false)
    }

    fn updatable_property_names(&self) -> &[&'static str] {
        &[
            "title",
            "description",
            "status",
            "snooze_until_utc",
            "tags",
            "is_deleted",
        ]
    }

    /// Critical stacks must be soft-deleted before they can be removed.
    fn can_delete(&self, value: &Stack) -> bool {
        !value.occurrences_are_critical || value.is_deleted
    }
}
