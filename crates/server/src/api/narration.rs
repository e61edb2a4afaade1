//! # Narration API
//!
//! `POST /api/v1/narration` answers with one chunked `text/plain` body: the
//! narrative as it is written, then the sentinel and the verdict JSON. A
//! generation failure aborts the body mid-stream; an unavailable evaluation
//! simply ends it without the verdict frame. The whole body, not just the
//! headers, must finish within `request_timeout_secs`.

use std::io;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use portal_core::narration::{encode_event, LocationDescriptor, ResidentRef};
use serde::Deserialize;
use tokio::time::{timeout_at, Instant};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use crate::SharedState;

/// A location to narrate
#[derive(Debug, Deserialize, ToSchema)]
pub struct NarrationRequest {
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    /// Residents with at least a `name`; other fields are carried through
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub residents: Vec<ResidentRef>,
}

impl From<NarrationRequest> for LocationDescriptor {
    fn from(req: NarrationRequest) -> Self {
        LocationDescriptor::new(req.name, req.kind, req.residents)
    }
}

pub fn routes() -> Router<SharedState> {
    Router::new().route("/", post(narrate))
}

/// Stream a narrated tour followed by its consistency verdict
#[utoipa::path(
    post,
    path = "/api/v1/narration",
    tag = "narration",
    request_body = NarrationRequest,
    responses(
        (status = 200, description = "Narrative text, then the verdict frame", content_type = "text/plain", body = String)
    )
)]
pub async fn narrate(
    State(state): State<SharedState>,
    Json(req): Json<NarrationRequest>,
) -> Response {
    let deadline = Instant::now() + Duration::from_secs(state.config.request_timeout_secs);
    let location: LocationDescriptor = req.into();
    tracing::info!(location = %location.name, residents = location.residents.len(), "Narration requested");

    // Dropping the body drops the receiver, which cancels the run.
    let handle = state.pipeline.spawn(location);
    let body = ReceiverStream::new(handle.events).map(|item| match item {
        Ok(event) => encode_event(&event)
            .map(Bytes::from)
            .map_err(std::io::Error::other),
        Err(e) => Err(std::io::Error::other(e.to_string())),
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(until_deadline(body, deadline)),
    )
        .into_response()
}

/// Ends `body` with a `TimedOut` error once `deadline` passes
fn until_deadline<S>(body: S, deadline: Instant) -> impl Stream<Item = io::Result<Bytes>>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    stream::unfold(Some(body), move |body| async move {
        let mut body = body?;
        match timeout_at(deadline, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!("Narration exceeded the request timeout");
                let err = io::Error::new(io::ErrorKind::TimedOut, "narration timed out");
                Some((Err(err), None))
            }
        }
    })
}
