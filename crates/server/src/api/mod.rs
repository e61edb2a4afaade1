//! # HTTP API
//!
//! ```text
//! /                      service banner
//! /health                liveness
//! /api/v1/narration      streamed tour (text/plain, chunked)
//! /api/v1/locations      catalog pages and lookups
//! /api/v1/notes          character notes
//! /api/v1/search         semantic search (503 without an index)
//! /api/v1/openapi.json   OpenAPI document
//! ```

pub mod locations;
pub mod narration;
pub mod notes;
pub mod search;

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use portal_core::catalog::CatalogError;
use portal_core::notes::NoteError;
use portal_core::search::SearchError;
use serde::Serialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};

use crate::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

/// Error side of every JSON handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<NoteError> for ApiError {
    fn from(e: NoteError) -> Self {
        match e {
            NoteError::Invalid(_) => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            _ => {
                tracing::error!("Notes store failure: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        tracing::warn!("Catalog request failed: {}", e);
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::EmptyQuery => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            _ => {
                tracing::warn!("Search failed: {}", e);
                Self::new(StatusCode::BAD_GATEWAY, e.to_string())
            }
        }
    }
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portal API",
        version = "1.0.0",
        description = "Streaming location tours with a consistency verdict"
    ),
    paths(
        root,
        health,
        narration::narrate,
        locations::list_locations,
        locations::locations_by_ids,
        notes::add_note,
        notes::get_notes,
        notes::get_notes_bulk,
        search::search
    ),
    components(
        schemas(
            ApiResponse,
            ServiceStatus,
            HealthStatus,
            narration::NarrationRequest,
            locations::LocationsResponse,
            locations::LocationIdsRequest,
            notes::NoteRequest,
            notes::NoteResponse,
            notes::BulkNotesRequest,
            notes::BulkNotesResponse,
            search::SearchRequest,
            search::SearchResponse,
            search::SearchHit
        )
    ),
    tags(
        (name = "narration", description = "Streamed location tours"),
        (name = "locations", description = "Location catalog"),
        (name = "notes", description = "Character notes"),
        (name = "search", description = "Semantic search"),
        (name = "service", description = "Service status")
    )
)]
pub struct ApiDoc;

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses(
        (status = 200, description = "Service is running", body = ServiceStatus)
    )
)]
pub async fn root() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        message: "Portal tour guide backend is running".to_string(),
        status: "ok".to_string(),
    })
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Healthy", body = HealthStatus)
    )
)]
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
    })
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: SharedState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1/narration", narration::routes())
        .nest("/api/v1/locations", locations::routes())
        .nest("/api/v1/notes", notes::routes())
        .nest("/api/v1/search", search::routes())
        .route("/api/v1/openapi.json", get(serve_openapi))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
