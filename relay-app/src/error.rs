use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_upstream::UpstreamError;
use thiserror::Error;

/// Which relay route a failure belongs to; picks the fixed client-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRoute {
    Chat,
    Whisper,
    Tts,
}

impl RelayRoute {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Whisper => "whisper",
            Self::Tts => "tts",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Chat => "Chat API Error",
            Self::Whisper => "Whisper API Error",
            Self::Tts => "TTS API Error",
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no file uploaded")]
    NoFileUploaded,

    #[error("invalid json body: {0}")]
    InvalidJson(String),

    #[error("invalid multipart body: {0}")]
    InvalidMultipart(String),

    #[error("{} upstream failure: {source}", .route.label())]
    Upstream {
        route: RelayRoute,
        #[source]
        source: UpstreamError,
    },
}

impl RelayError {
    pub fn upstream(route: RelayRoute) -> impl FnOnce(UpstreamError) -> Self {
        move |source| Self::Upstream { route, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoFileUploaded | Self::InvalidJson(_) | Self::InvalidMultipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed text sent to the client. Never includes upstream detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NoFileUploaded => "No file uploaded",
            Self::InvalidJson(_) => "Invalid JSON body",
            Self::InvalidMultipart(_) => "Invalid multipart body",
            Self::Upstream { route, .. } => route.failure_message(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Upstream { route, source } => {
                tracing::error!(
                    route = route.label(),
                    upstream_status = ?source.status(),
                    error = %source,
                    "upstream relay failed"
                );
            }
            other => {
                tracing::warn!(error = %other, "relay request rejected");
            }
        }
        (self.status(), self.public_message()).into_response()
    }
}
