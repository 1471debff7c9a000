pub mod chat;
pub mod health;
pub mod tts;
pub mod whisper;

use crate::error::RelayError;
use axum::Router;
use bytes::Bytes;

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())
        .merge(whisper::router())
        .merge(tts::router())
}

/// Check that an inbound body is a JSON object or array and return it untouched.
///
/// An empty body is relayed as `{}`.
pub(crate) fn json_body(body: Bytes) -> Result<Bytes, RelayError> {
    let Some(first) = body.iter().find(|b| !b.is_ascii_whitespace()) else {
        return Ok(Bytes::from_static(b"{}"));
    };
    if *first != b'{' && *first != b'[' {
        return Err(RelayError::InvalidJson(
            "body must be a json object or array".to_string(),
        ));
    }
    serde_json::from_slice::<serde::de::IgnoredAny>(&body)
        .map_err(|e| RelayError::InvalidJson(e.to_string()))?;
    Ok(body)
}
