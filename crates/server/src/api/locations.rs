//! # Locations API
//!
//! Pass-through to the GraphQL catalog.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use portal_core::catalog::Location;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based catalog page
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationsResponse {
    #[schema(value_type = Vec<Object>)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationIdsRequest {
    pub ids: Vec<String>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_locations))
        .route("/by-ids", post(locations_by_ids))
}

/// One page of locations with their residents
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "locations",
    params(PageQuery),
    responses(
        (status = 200, description = "Locations on the page", body = LocationsResponse),
        (status = 502, description = "Catalog unavailable", body = super::ApiResponse)
    )
)]
pub async fn list_locations(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let locations = state.catalog.fetch_page(query.page.max(1)).await?;
    Ok(Json(LocationsResponse { locations }))
}

/// Locations by catalog id
#[utoipa::path(
    post,
    path = "/api/v1/locations/by-ids",
    tag = "locations",
    request_body = LocationIdsRequest,
    responses(
        (status = 200, description = "Matching locations", body = LocationsResponse),
        (status = 502, description = "Catalog unavailable", body = super::ApiResponse)
    )
)]
pub async fn locations_by_ids(
    State(state): State<SharedState>,
    Json(req): Json<LocationIdsRequest>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let locations = state.catalog.fetch_by_ids(&req.ids).await?;
    Ok(Json(LocationsResponse { locations }))
}

#[cfg(test)]
mod tests {
    use crate::api::{router, testing};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_empty_id_list_skips_catalog() {
        let app = router(testing::state());
        let response = app
            .oneshot(
                Request::post("/api/v1/locations/by-ids")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ids":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), br#"{"locations":[]}"#);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_is_bad_gateway() {
        let app = router(testing::state());
        let response = app
            .oneshot(
                Request::get("/api/v1/locations?page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }
}
