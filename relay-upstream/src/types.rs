use bytes::Bytes;

/// The upstream endpoints the relay is allowed to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamEndpoint {
    ChatCompletions,
    Transcriptions,
    Speech,
}

impl UpstreamEndpoint {
    /// Path relative to the upstream base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::ChatCompletions => "/chat/completions",
            Self::Transcriptions => "/audio/transcriptions",
            Self::Speech => "/audio/speech",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat",
            Self::Transcriptions => "transcriptions",
            Self::Speech => "speech",
        }
    }
}

/// A successful upstream reply carrying JSON.
///
/// The body has been checked to parse as JSON but is kept as the exact bytes
/// the upstream sent, so the relay can hand it back without re-serializing.
#[derive(Debug, Clone)]
pub struct UpstreamJson {
    pub status: u16,
    pub body: Bytes,
}

/// An audio file held in memory for forwarding to the transcription endpoint.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
}

impl AudioUpload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name: "audio.webm".to_string(),
            content_type: "audio/webm".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
