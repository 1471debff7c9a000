use crate::error::{Result, UpstreamError};
use crate::types::{AudioUpload, UpstreamEndpoint};
use reqwest::multipart::{Form, Part};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Trim whitespace and trailing slashes so endpoint paths join cleanly.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(UpstreamError::InvalidInput(
            "upstream base url must not be empty".to_string(),
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(UpstreamError::InvalidInput(format!(
            "upstream base url must start with http:// or https://, got {trimmed:?}"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn endpoint_url(base_url: &str, endpoint: UpstreamEndpoint) -> String {
    format!("{base_url}{}", endpoint.path())
}

/// Multipart body for the transcription endpoint: the audio file plus the model id.
pub(crate) fn transcription_form(upload: AudioUpload, model: &str) -> Result<Form> {
    let AudioUpload {
        bytes,
        file_name,
        content_type,
    } = upload;
    let length = bytes.len() as u64;
    let file = Part::stream_with_length(reqwest::Body::from(bytes), length)
        .file_name(file_name)
        .mime_str(&content_type)
        .map_err(|e| UpstreamError::InvalidInput(format!("audio content type: {e}")))?;
    Ok(Form::new()
        .part("file", file)
        .text("model", model.to_string()))
}
