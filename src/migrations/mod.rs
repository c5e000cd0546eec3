//! Forward-only, versioned index migrations.
//!
//! Deciding *whether* a migration runs (tracking applied versions) belongs to
//! the caller; a [`Migration`] only performs its work when invoked. Every
//! migration here must be safe to run again: its queries only target
//! documents that still need the change.

pub mod stack_status;

use crate::core::Result;
use crate::storage::UpdateByQueryFailure;
use async_trait::async_trait;
use std::time::Duration;

pub use stack_status::{LegacyStackFlags, SetStackStatus, StackStatusScript};

#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &'static str;

    /// Version used by the tracking mechanism; `None` for migrations that run
    /// on every invocation.
    fn version(&self) -> Option<u32>;

    async fn run(&self) -> Result<MigrationReport>;
}

/// Aggregate outcome of one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub name: &'static str,
    pub version: Option<u32>,
    pub duration: Duration,
    /// Documents matched by the migration's query.
    pub total: u64,
    pub updated: u64,
    pub noops: u64,
    pub failures: Vec<UpdateByQueryFailure>,
}

impl MigrationReport {
    pub fn errors(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
