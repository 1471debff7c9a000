use crate::error::{RelayError, RelayRoute};
use crate::routes::json_body;
use crate::server::RelayState;
use axum::Extension;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/tts", post(relay_tts))
}

#[tracing::instrument(level = "info", skip_all, fields(body_bytes = body.len()))]
async fn relay_tts(
    Extension(state): Extension<Arc<RelayState>>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let body = json_body(body)?;
    let audio = state
        .upstream
        .speech(body)
        .await
        .map_err(RelayError::upstream(RelayRoute::Tts))?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
