//! Concrete resources served by the binary and the router that mounts them.

pub mod project;
pub mod stack;

use crate::resource::ResourceController;
use crate::storage::Repository;
use crate::web::resource_router;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use project::{Project, ProjectResource, ProjectView, project_name_key};
pub use stack::{Stack, StackResource, StackStatus};

/// Storage accessors backing the mounted resources.
#[derive(Clone)]
pub struct ApiRepositories {
    pub projects: Arc<dyn Repository<Project>>,
    pub stacks: Arc<dyn Repository<Stack>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Normalizes a mount prefix to `""` or `/segment[/segment...]`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

pub fn build_router(prefix: &str, repositories: ApiRepositories) -> Router {
    let prefix = normalize_prefix(prefix);
    let projects_path = format!("{prefix}/projects");
    let stacks_path = format!("{prefix}/stacks");

    let projects = ResourceController::new(
        ProjectResource::new(repositories.projects),
        &projects_path,
    );
    let stacks = ResourceController::new(StackResource::new(repositories.stacks), &stacks_path);

    Router::new()
        .route("/health", get(healthcheck))
        .nest(&projects_path, resource_router(projects))
        .nest(&stacks_path, resource_router(stacks))
        .layer(TraceLayer::new_for_http())
}
