//! HTTP surface: upload authorization, direct upload, health.
//!
//! Every response carries permissive cross-origin headers so browser
//! clients can call the API from anywhere. The upload PUT is what turns
//! a client deposit into a pipeline run.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;
use crate::receipt::ObjectRef;
use crate::storage::ObjectStore;
use crate::uploads::{UploadAuthorizer, UploadError};

/// Content type assumed when a client does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Shared state for all handlers.
pub struct AppState {
    pub authorizer: UploadAuthorizer,
    pub objects: Arc<ObjectStore>,
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest {
    file_type: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct AcceptedResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct UploadQuery {
    token: String,
}

/// Builds the router.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/uploads", post(authorize_upload).options(preflight))
        .route("/api/uploads/*key", put(put_object))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Empty success for pre-flight requests, independent of the main logic.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Issues an upload credential.
///
/// The body is an optional JSON object with a `fileType`; a missing body
/// or field defaults to `image/jpeg`, while a present but malformed body
/// is reported back as an error rather than crashing the caller.
async fn authorize_upload(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: AuthorizeRequest = if body.is_empty() {
        AuthorizeRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed upload-authorization body");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: e.to_string(),
                    }),
                )
                    .into_response();
            }
        }
    };

    let content_type = request
        .file_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    match state.authorizer.authorize(&content_type) {
        Ok(grant) => {
            info!(filename = %grant.filename, "Issued upload credential");
            (StatusCode::OK, Json(grant)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to issue upload credential");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Accepts the image bytes for a previously authorized key, stores them,
/// and triggers the processing pipeline for the new object.
async fn put_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    if let Err(e) = state
        .authorizer
        .verify_and_consume(&query.token, &key, &content_type)
    {
        warn!(key = %key, error = %e, "Rejected upload");
        return (
            upload_error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response();
    }

    if let Err(e) = state.objects.put(&key, &body) {
        error!(key = %key, error = %e, "Failed to store uploaded object");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response();
    }

    info!(key = %key, bytes = body.len(), "Object stored, pipeline triggered");

    // One invocation per stored object. The upload response does not wait
    // for processing; failures surface through logs and email absence.
    let source = ObjectRef::new(state.objects.container(), key);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let (result, _ctx) = pipeline.run(source).await;
        if !result.success {
            error!(
                error = result.error.as_deref().unwrap_or("unknown"),
                "Receipt processing failed"
            );
        }
    });

    (StatusCode::OK, Json(AcceptedResponse { status: "accepted" })).into_response()
}

fn upload_error_status(e: &UploadError) -> StatusCode {
    match e {
        UploadError::InvalidToken(_) | UploadError::KeyMismatch(_) => StatusCode::FORBIDDEN,
        UploadError::ContentTypeMismatch { .. } => StatusCode::BAD_REQUEST,
        UploadError::Expired(_) => StatusCode::GONE,
        UploadError::AlreadyUsed(_) => StatusCode::CONFLICT,
        UploadError::Seal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
