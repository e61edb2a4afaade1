//! # Search API

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use portal_core::search::{DocumentKind, SearchMatch};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiError;
use crate::SharedState;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    /// Defaults to 5, capped at 50
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    pub id: String,
    /// `character` or `location`
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub content: String,
    pub score: f32,
}

impl From<SearchMatch> for SearchHit {
    fn from(hit: SearchMatch) -> Self {
        let kind = match hit.document.metadata.kind {
            DocumentKind::Character => "character",
            DocumentKind::Location => "location",
        };
        Self {
            id: hit.document.metadata.id,
            kind: kind.to_string(),
            name: hit.document.metadata.name,
            content: hit.document.content,
            score: hit.score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

pub fn routes() -> Router<SharedState> {
    Router::new().route("/", post(search))
}

/// Semantic search over characters and locations
#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked results", body = SearchResponse),
        (status = 400, description = "Empty query", body = super::ApiResponse),
        (status = 503, description = "No search index loaded", body = super::ApiResponse)
    )
)]
pub async fn search(
    State(state): State<SharedState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Some(service) = state.search.as_ref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Search index not loaded; run `portal index` first",
        ));
    };

    let limit = req.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let results = service
        .embed_and_search(&req.query, limit)
        .await?
        .into_iter()
        .map(SearchHit::from)
        .collect();
    Ok(Json(SearchResponse { results }))
}
