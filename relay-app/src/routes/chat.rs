use crate::error::{RelayError, RelayRoute};
use crate::routes::json_body;
use crate::server::RelayState;
use axum::Extension;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use relay_upstream::UpstreamJson;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/chat", post(relay_chat))
}

#[tracing::instrument(level = "info", skip_all, fields(body_bytes = body.len()))]
async fn relay_chat(
    Extension(state): Extension<Arc<RelayState>>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let body = json_body(body)?;
    let reply = state
        .upstream
        .chat_completions(body)
        .await
        .map_err(RelayError::upstream(RelayRoute::Chat))?;
    Ok(json_reply(reply))
}

/// Relay an upstream JSON reply with its status and exact bytes.
pub(crate) fn json_reply(reply: UpstreamJson) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
    (status, [(header::CONTENT_TYPE, "application/json")], reply.body).into_response()
}
