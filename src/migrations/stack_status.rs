//! Migration 1: derive `status` for stacks indexed before the field existed.

use super::{Migration, MigrationReport};
use crate::api::StackStatus;
use crate::core::{JsonMap, Result};
use crate::storage::{
    DocumentQuery, IndexMapping, IndexStore, RefreshTarget, ScriptOutcome, UpdateScript,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Selects stacks that have not been migrated yet.
pub const MISSING_STATUS_QUERY: &str = "_missing_:status";

/// The decision table of [`LegacyStackFlags::derive_status`] as a Painless
/// script, for stores that execute scripts server-side.
pub const STACK_STATUS_PAINLESS: &str = "if (ctx._source.is_regressed == true) ctx._source.status = 'regressed'; \
     else if (ctx._source.is_hidden == true) ctx._source.status = 'ignored'; \
     else if (ctx._source.disable_notifications == true) ctx._source.status = 'ignored'; \
     else if (ctx._source.is_fixed == true) ctx._source.status = 'fixed'; \
     else ctx._source.status = 'open';";

/// Flags that predate `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyStackFlags {
    pub is_regressed: bool,
    pub is_hidden: bool,
    pub disable_notifications: bool,
    pub is_fixed: bool,
}

impl LegacyStackFlags {
    /// Reads the flags from a raw stack document. Only a JSON `true` sets a
    /// flag; missing, `null` or non-boolean values read as unset.
    pub fn from_source(source: &JsonMap) -> Self {
        let flag = |name: &str| matches!(source.get(name), Some(Value::Bool(true)));
        Self {
            is_regressed: flag("is_regressed"),
            is_hidden: flag("is_hidden"),
            disable_notifications: flag("disable_notifications"),
            is_fixed: flag("is_fixed"),
        }
    }

    /// First matching rule wins; the order is significant.
    pub fn derive_status(&self) -> StackStatus {
        if self.is_regressed {
            StackStatus::Regressed
        } else if self.is_hidden || self.disable_notifications {
            StackStatus::Ignored
        } else if self.is_fixed {
            StackStatus::Fixed
        } else {
            StackStatus::Open
        }
    }
}

/// Sets `status` from the legacy flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackStatusScript;

impl UpdateScript for StackStatusScript {
    fn source(&self) -> &str {
        STACK_STATUS_PAINLESS
    }

    fn apply(&self, source: &mut JsonMap) -> std::result::Result<ScriptOutcome, String> {
        let status = LegacyStackFlags::from_source(source).derive_status();
        source.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
        Ok(ScriptOutcome::Updated)
    }
}

pub struct SetStackStatus {
    store: Arc<dyn IndexStore>,
    index: String,
}

impl SetStackStatus {
    pub fn new(store: Arc<dyn IndexStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    /// Fields added to the stack index. `deleted` is queryable as an alias of
    /// `is_deleted`.
    pub fn mapping() -> IndexMapping {
        IndexMapping::new()
            .keyword("status")
            .date("snooze_until_utc")
            .boolean("is_deleted")
            .alias("deleted", "is_deleted")
    }
}

#[async_trait]
impl Migration for SetStackStatus {
    fn name(&self) -> &'static str {
        "set-stack-status"
    }

    fn version(&self) -> Option<u32> {
        Some(1)
    }

    async fn run(&self) -> Result<MigrationReport> {
        info!(index = %self.index, "Start migration for adding stack status");

        info!("Adding status, snooze_until_utc and is_deleted mappings to stack index");
        self.store.put_mapping(&self.index, &Self::mapping()).await?;
        info!("Finished adding mappings");

        info!("Begin refreshing all indices");
        self.store.refresh(RefreshTarget::All).await?;
        info!("Done refreshing all indices");

        info!("Start migrating stacks status");
        let started = Instant::now();
        let query = DocumentQuery::parse(MISSING_STATUS_QUERY)?;
        let response = self
            .store
            .update_by_query(&self.index, &query, &StackStatusScript)
            .await?;

        for failure in &response.failures {
            warn!(
                index = %failure.index,
                id = %failure.id,
                reason = %failure.reason,
                "stack status could not be set"
            );
        }

        let report = MigrationReport {
            name: self.name(),
            version: self.version(),
            duration: started.elapsed(),
            total: response.total,
            updated: response.updated,
            noops: response.noops,
            failures: response.failures,
        };
        info!(
            time = ?report.duration,
            completed = report.updated,
            total = report.total,
            errors = report.errors(),
            "Finished adding stack status"
        );
        Ok(report)
    }
}
