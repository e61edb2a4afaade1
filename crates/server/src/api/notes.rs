//! # Notes API

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use portal_core::notes::{NewNote, Note};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct NoteRequest {
    pub character_id: String,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NoteResponse {
    pub id: i64,
    pub character_id: String,
    pub content: String,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            character_id: note.character_id,
            content: note.content,
            timestamp: note.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkNotesRequest {
    pub character_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkNotesResponse {
    /// Every requested id, newest note first
    pub notes: HashMap<String, Vec<NoteResponse>>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(add_note))
        .route("/bulk", post(get_notes_bulk))
        .route("/:character_id", get(get_notes))
}

/// Attach a note to a character
#[utoipa::path(
    post,
    path = "/api/v1/notes",
    tag = "notes",
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Stored note", body = NoteResponse),
        (status = 400, description = "Empty character id or content", body = super::ApiResponse)
    )
)]
pub async fn add_note(
    State(state): State<SharedState>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state.notes.add(NewNote {
        character_id: req.character_id,
        content: req.content,
    })?;
    tracing::debug!(character_id = %note.character_id, id = note.id, "Note added");
    Ok(Json(note.into()))
}

/// Notes for one character, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notes/{character_id}",
    tag = "notes",
    params(("character_id" = String, Path, description = "Catalog character id")),
    responses(
        (status = 200, description = "Notes", body = Vec<NoteResponse>)
    )
)]
pub async fn get_notes(
    State(state): State<SharedState>,
    Path(character_id): Path<String>,
) -> Result<Json<Vec<NoteResponse>>, ApiError> {
    let notes = state.notes.get_by_owner(&character_id)?;
    Ok(Json(notes.into_iter().map(NoteResponse::from).collect()))
}

/// Notes for many characters in one call
#[utoipa::path(
    post,
    path = "/api/v1/notes/bulk",
    tag = "notes",
    request_body = BulkNotesRequest,
    responses(
        (status = 200, description = "Notes grouped by character", body = BulkNotesResponse)
    )
)]
pub async fn get_notes_bulk(
    State(state): State<SharedState>,
    Json(req): Json<BulkNotesRequest>,
) -> Result<Json<BulkNotesResponse>, ApiError> {
    let notes = state
        .notes
        .get_bulk_by_owners(&req.character_ids)?
        .into_iter()
        .map(|(id, notes)| (id, notes.into_iter().map(NoteResponse::from).collect()))
        .collect();
    Ok(Json(BulkNotesResponse { notes }))
}

#[cfg(test)]
mod tests {
    use crate::api::{router, testing};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_then_fetch() {
        let app = router(testing::state());

        let (status, created) = call(
            &app,
            post_json("/api/v1/notes", r#"{"character_id":"1","content":"Wubba lubba"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["character_id"], "1");

        let (status, notes) = call(
            &app,
            Request::get("/api/v1/notes/1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(notes.as_array().unwrap().len(), 1);
        assert_eq!(notes[0]["content"], "Wubba lubba");
    }

    #[tokio::test]
    async fn test_bulk_includes_every_requested_id() {
        let app = router(testing::state());
        call(
            &app,
            post_json("/api/v1/notes", r#"{"character_id":"2","content":"Aw geez"}"#),
        )
        .await;

        let (status, body) = call(
            &app,
            post_json("/api/v1/notes/bulk", r#"{"character_ids":["2","3"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notes"]["2"].as_array().unwrap().len(), 1);
        assert!(body["notes"]["3"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_is_bad_request() {
        let app = router(testing::state());
        let (status, body) = call(
            &app,
            post_json("/api/v1/notes", r#"{"character_id":"1","content":"  "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
