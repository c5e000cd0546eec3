use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use repoapi::api::{ApiRepositories, Project, Stack, build_router, project_name_key};
use repoapi::storage::{InMemoryRepository, Repository};
use serde_json::{Value, json};
use tower::ServiceExt;

const PROJECTS: &str = "/api/v2/projects";
const STACKS: &str = "/api/v2/stacks";

struct TestApp {
    router: Router,
    projects: Arc<InMemoryRepository<Project>>,
}

fn app() -> TestApp {
    let projects = Arc::new(InMemoryRepository::new().with_unique_key(project_name_key()));
    let stacks = Arc::new(InMemoryRepository::<Stack>::new());
    let router = build_router(
        "/api/v2",
        ApiRepositories {
            projects: projects.clone(),
            stacks,
        },
    );
    TestApp { router, projects }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request
        .body(body.map_or_else(Body::empty, |text| Body::from(text.to_string())))
        .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be valid JSON")
    };
    Reply {
        status,
        headers,
        body,
    }
}

async fn create(app: &Router, base: &str, payload: Value) -> String {
    let reply = send(app, Method::POST, base, Some(&payload.to_string())).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.headers[header::LOCATION]
        .to_str()
        .expect("location should be ascii")
        .to_string()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = app();
    let reply = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
}

#[tokio::test]
async fn create_returns_location_and_empty_body() {
    let app = app();
    let reply = send(
        &app.router,
        Method::POST,
        PROJECTS,
        Some(&json!({ "organization_id": "org1", "name": "Web" }).to_string()),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body, Value::Null);
    let location = reply.headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/api/v2/projects/"));

    let fetched = send(&app.router, Method::GET, location, None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["name"], "Web");
    assert_eq!(
        format!("{PROJECTS}/{}", fetched.body["id"].as_str().unwrap()),
        location
    );
    assert!(fetched.body.get("api_keys").is_none());
}

#[tokio::test]
async fn list_normalizes_invalid_paging() {
    let app = app();
    for name in ["a", "b", "c"] {
        create(&app.router, PROJECTS, json!({ "organization_id": "org1", "name": name })).await;
    }

    let reply = send(
        &app.router,
        Method::GET,
        &format!("{PROJECTS}?page=0&pageSize=-5"),
        None,
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["page"], 1);
    assert_eq!(reply.body["page_size"], 10);
    assert_eq!(reply.body["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_pages_with_effective_values() {
    let app = app();
    for name in ["a", "b", "c"] {
        create(&app.router, PROJECTS, json!({ "organization_id": "org1", "name": name })).await;
    }

    let reply = send(
        &app.router,
        Method::GET,
        &format!("{PROJECTS}?page=2&page_size=2"),
        None,
    )
    .await;
    assert_eq!(reply.body["page"], 2);
    assert_eq!(reply.body["page_size"], 2);
    let results = reply.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "c");

    let empty = send(&app.router, Method::GET, STACKS, None).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["results"], json!([]));
}

#[tokio::test]
async fn repeated_paging_parameters_are_normalized_not_rejected() {
    let app = app();
    for name in ["a", "b", "c", "d"] {
        create(&app.router, PROJECTS, json!({ "organization_id": "org1", "name": name })).await;
    }

    let reply = send(
        &app.router,
        Method::GET,
        &format!("{PROJECTS}?page_size=2&pageSize=3"),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["page"], 1);
    assert_eq!(reply.body["page_size"], 3);
    assert_eq!(reply.body["results"].as_array().unwrap().len(), 3);

    let reply = send(
        &app.router,
        Method::GET,
        &format!("{PROJECTS}?page=1&page=2&limit=3"),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["page"], 2);
    assert_eq!(reply.body["page_size"], 3);
    let results = reply.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "d");

    let reply = send(
        &app.router,
        Method::GET,
        &format!("{PROJECTS}?page=x&page_size=&unrelated=1"),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["page"], 1);
    assert_eq!(reply.body["page_size"], 10);
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let app = app();
    let reply = send(&app.router, Method::GET, &format!("{PROJECTS}/nope"), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_gets_use_the_cache() {
    let app = app();
    let location = create(
        &app.router,
        PROJECTS,
        json!({ "organization_id": "org1", "name": "Cached" }),
    )
    .await;

    for _ in 0..3 {
        assert_eq!(
            send(&app.router, Method::GET, &location, None).await.status,
            StatusCode::OK
        );
    }
    let stats = app.projects.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 2);
}

#[tokio::test]
async fn create_rejections_map_to_distinct_statuses() {
    let app = app();

    let preset = json!({ "id": "mine", "organization_id": "org1", "name": "Web" });
    let reply = send(&app.router, Method::POST, PROJECTS, Some(&preset.to_string())).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&app.router, Method::POST, PROJECTS, Some("null")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app.router, Method::POST, PROJECTS, None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app.router, Method::POST, PROJECTS, Some("{\"name\": ")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    create(&app.router, PROJECTS, json!({ "organization_id": "org1", "name": "Web" })).await;
    let duplicate = json!({ "organization_id": "org1", "name": "WEB" });
    let reply = send(&app.router, Method::POST, PROJECTS, Some(&duplicate.to_string())).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(app.projects.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_patch_succeeds_even_for_unknown_ids() {
    let app = app();
    for body in [None, Some("null"), Some("{}")] {
        let reply = send(&app.router, Method::PATCH, &format!("{PROJECTS}/nope"), body).await;
        assert_eq!(reply.status, StatusCode::OK, "{body:?}");
    }
}

#[tokio::test]
async fn patch_of_unknown_entity_is_not_found() {
    let app = app();
    let reply = send(
        &app.router,
        Method::PATCH,
        &format!("{PROJECTS}/nope"),
        Some(r#"{"name":"x"}"#),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_rejects_every_unauthorized_property_and_applies_nothing() {
    let app = app();
    let location = create(
        &app.router,
        PROJECTS,
        json!({ "organization_id": "org1", "name": "Web" }),
    )
    .await;

    let reply = send(
        &app.router,
        Method::PATCH,
        &location,
        Some(r#"{"name":"Renamed","organization_id":"org2","api_keys":["k"]}"#),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body["error"],
        "The following properties can't be changed: organization_id, api_keys"
    );

    let fetched = send(&app.router, Method::GET, &location, None).await;
    assert_eq!(fetched.body["name"], "Web");
    assert_eq!(fetched.body["organization_id"], "org1");
}

#[tokio::test]
async fn patch_and_put_apply_allowed_changes() {
    let app = app();
    let location = create(
        &app.router,
        PROJECTS,
        json!({ "organization_id": "org1", "name": "Web" }),
    )
    .await;

    let reply = send(&app.router, Method::PATCH, &location, Some(r#"{"name":"Api"}"#)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(
        &app.router,
        Method::PUT,
        &location,
        Some(r#"{"delete_bot_data_enabled":true}"#),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let fetched = send(&app.router, Method::GET, &location, None).await;
    assert_eq!(fetched.body["name"], "Api");
    assert_eq!(fetched.body["delete_bot_data_enabled"], true);
}

#[tokio::test]
async fn delete_of_missing_entity_is_bad_request_not_not_found() {
    let app = app();
    let reply = send(&app.router, Method::DELETE, &format!("{PROJECTS}/nope"), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let get = send(&app.router, Method::GET, &format!("{PROJECTS}/nope"), None).await;
    assert_eq!(get.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn declined_delete_is_unauthorized() {
    let app = app();
    let location = create(
        &app.router,
        STACKS,
        json!({ "project_id": "p1", "title": "Crash", "occurrences_are_critical": true }),
    )
    .await;

    let reply = send(&app.router, Method::DELETE, &location, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(&app.router, Method::PATCH, &location, Some(r#"{"is_deleted":true}"#)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let listed = send(&app.router, Method::GET, STACKS, None).await;
    assert_eq!(listed.body["results"], json!([]));

    let reply = send(&app.router, Method::DELETE, &location, None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(&app.router, Method::GET, &location, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
