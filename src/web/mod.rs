//! HTTP surface for resource controllers.
//!
//! [`resource_router`] mounts the five generic operations for one resource:
//!
//! | verb          | path    | success                  |
//! |---------------|---------|--------------------------|
//! | `GET`         | `/`     | 200 + paged projections  |
//! | `GET`         | `/{id}` | 200 + projection         |
//! | `POST`        | `/`     | 201 + `Location`, empty  |
//! | `PATCH`/`PUT` | `/{id}` | 200                      |
//! | `DELETE`      | `/{id}` | 200                      |
//!
//! The returned router is meant to be `nest`ed under the same path the
//! controller was given as its base path. Role checks happen upstream.

use crate::resource::{
    ChangeSet, PageQuery, PagedResult, Resource, ResourceController, ResourceError, ResourceResult,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ResourceError::NotFound => StatusCode::NOT_FOUND,
            ResourceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ResourceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ResourceError::Conflict => StatusCode::CONFLICT,
            ResourceError::Storage(err) => {
                error!(error = %err, "storage operation failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "storage operation failed".to_string(),
                    }),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn resource_router<R: Resource>(controller: ResourceController<R>) -> Router {
    Router::new()
        .route("/", get(list_resources::<R>).post(create_resource::<R>))
        .route(
            "/{id}",
            get(get_resource::<R>)
                .patch(patch_resource::<R>)
                .put(patch_resource::<R>)
                .delete(delete_resource::<R>),
        )
        .with_state(controller)
}

/// Parses an optional JSON body: empty or `null` yields `None`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ResourceResult<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(body)
        .map_err(|err| ResourceError::bad_request(format!("The request body is invalid: {err}")))
}

async fn list_resources<R: Resource>(
    State(controller): State<ResourceController<R>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ResourceResult<Json<PagedResult<R::View>>> {
    let query = PageQuery::from_pairs(pairs);
    let page = controller.list(query.normalize()).await?;
    Ok(Json(page))
}

async fn get_resource<R: Resource>(
    State(controller): State<ResourceController<R>>,
    Path(id): Path<String>,
) -> ResourceResult<Json<R::View>> {
    let view = controller.get(Some(id.as_str())).await?;
    Ok(Json(view))
}

async fn create_resource<R: Resource>(
    State(controller): State<ResourceController<R>>,
    body: Bytes,
) -> ResourceResult<Response> {
    let value = parse_body::<R::Entity>(&body)?;
    let created = controller.create(value).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, created.location)],
    )
        .into_response())
}

async fn patch_resource<R: Resource>(
    State(controller): State<ResourceController<R>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ResourceResult<StatusCode> {
    let changes = parse_body::<ChangeSet>(&body)?.unwrap_or_default();
    controller.patch(Some(id.as_str()), changes).await?;
    Ok(StatusCode::OK)
}

async fn delete_resource<R: Resource>(
    State(controller): State<ResourceController<R>>,
    Path(id): Path<String>,
) -> ResourceResult<StatusCode> {
    controller.delete(Some(id.as_str())).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreError;

    #[test]
    fn errors_map_to_their_statuses() {
        let cases = [
            (ResourceError::NotFound, StatusCode::NOT_FOUND),
            (ResourceError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ResourceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ResourceError::Conflict, StatusCode::CONFLICT),
            (
                ResourceError::Storage(StoreError::Execution("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn parse_body_treats_blank_and_null_as_absent() {
        assert_eq!(parse_body::<ChangeSet>(&Bytes::from_static(b"  ")).unwrap(), None);
        assert_eq!(parse_body::<ChangeSet>(&Bytes::from_static(b"null")).unwrap(), None);
        assert!(matches!(
            parse_body::<ChangeSet>(&Bytes::from_static(b"{not json")),
            Err(ResourceError::BadRequest(_))
        ));
    }
}
