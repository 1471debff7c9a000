use crate::error::{Result, UpstreamError};
use crate::openai::{
    DEFAULT_TRANSCRIPTION_MODEL, endpoint_url, normalize_base_url, transcription_form,
};
use crate::types::{AudioUpload, UpstreamEndpoint, UpstreamJson};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::Duration;

/// HTTP client for the upstream provider. Holds the credential and attaches it
/// to every outbound request; callers never see it.
#[derive(Clone)]
pub struct UpstreamClient {
    api_key: String,
    base_url: String,
    transcription_model: String,
    client: reqwest::Client,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .finish()
    }
}

impl UpstreamClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(UpstreamError::InvalidInput(
                "upstream api key must not be empty".to_string(),
            ));
        }
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::InvalidInput(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            client,
        })
    }

    pub fn with_transcription_model(mut self, model: &str) -> Result<Self> {
        let model = model.trim();
        if model.is_empty() {
            return Err(UpstreamError::InvalidInput(
                "transcription model must not be empty".to_string(),
            ));
        }
        self.transcription_model = model.to_string();
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transcription_model(&self) -> &str {
        &self.transcription_model
    }

    /// Forward a chat-completion request body as-is.
    #[tracing::instrument(level = "info", skip_all, fields(body_bytes = body.len()))]
    pub async fn chat_completions(&self, body: Bytes) -> Result<UpstreamJson> {
        let response = self
            .post_json(UpstreamEndpoint::ChatCompletions, body)
            .await?;
        read_json(UpstreamEndpoint::ChatCompletions, response).await
    }

    /// Re-encode an uploaded audio file as multipart and request a transcription.
    #[tracing::instrument(level = "info", skip_all, fields(audio_bytes = upload.len()))]
    pub async fn transcribe(&self, upload: AudioUpload) -> Result<UpstreamJson> {
        let endpoint = UpstreamEndpoint::Transcriptions;
        let form = transcription_form(upload, &self.transcription_model)?;
        let response = self
            .client
            .post(endpoint_url(&self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(endpoint, response).await?;
        read_json(endpoint, response).await
    }

    /// Forward a speech-synthesis request body and return the raw audio bytes.
    #[tracing::instrument(level = "info", skip_all, fields(body_bytes = body.len()))]
    pub async fn speech(&self, body: Bytes) -> Result<Bytes> {
        let response = self.post_json(UpstreamEndpoint::Speech, body).await?;
        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "upstream speech received");
        Ok(audio)
    }

    async fn post_json(
        &self,
        endpoint: UpstreamEndpoint,
        body: Bytes,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(endpoint_url(&self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        ensure_success(endpoint, response).await
    }
}

async fn ensure_success(
    endpoint: UpstreamEndpoint,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(
        endpoint = endpoint.label(),
        status = status.as_u16(),
        "upstream returned non-success status"
    );
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json(
    endpoint: UpstreamEndpoint,
    response: reqwest::Response,
) -> Result<UpstreamJson> {
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    serde_json::from_slice::<serde::de::IgnoredAny>(&body).map_err(|e| {
        UpstreamError::ResponseFormat(format!("{} reply is not json: {e}", endpoint.label()))
    })?;
    Ok(UpstreamJson { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "sk-test-relay-credential";

    fn client_for(server: &httpmock::MockServer) -> UpstreamClient {
        UpstreamClient::new(
            TEST_KEY,
            &format!("{}/v1", server.base_url()),
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = UpstreamClient::new("   ", "https://api.openai.com/v1", Duration::from_secs(5))
            .expect_err("empty key must fail");
        assert!(matches!(err, UpstreamError::InvalidInput(_)));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let client = UpstreamClient::new(TEST_KEY, "https://api.openai.com/v1", Duration::from_secs(5))
            .expect("client builds");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains(TEST_KEY));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn transcription_model_override_must_be_non_empty() {
        let client = UpstreamClient::new(TEST_KEY, "https://api.openai.com/v1", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(client.transcription_model(), "whisper-1");
        assert!(client.clone().with_transcription_model(" ").is_err());
        let client = client
            .with_transcription_model("gpt-4o-transcribe")
            .expect("model accepted");
        assert_eq!(client.transcription_model(), "gpt-4o-transcribe");
    }

    #[tokio::test]
    async fn chat_forwards_exact_body_with_bearer_credential() {
        let server = httpmock::MockServer::start_async().await;
        let request_body = r#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#;
        let reply = r#"{"id":"chatcmpl-1","choices":[]}"#;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/chat/completions")
                    .header("authorization", format!("Bearer {TEST_KEY}"))
                    .header("content-type", "application/json")
                    .body(request_body);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(reply);
            })
            .await;

        let resp = client_for(&server)
            .chat_completions(Bytes::from_static(request_body.as_bytes()))
            .await
            .expect("chat succeeds");

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Bytes::from_static(reply.as_bytes()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn chat_non_success_status_keeps_upstream_detail_in_error() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/v1/chat/completions");
                then.status(429).body(r#"{"error":{"message":"rate limited"}}"#);
            })
            .await;

        let err = client_for(&server)
            .chat_completions(Bytes::from_static(b"{}"))
            .await
            .expect_err("429 must fail");

        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn chat_success_with_non_json_body_is_a_format_error() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/v1/chat/completions");
                then.status(200).body("<html>gateway</html>");
            })
            .await;

        let err = client_for(&server)
            .chat_completions(Bytes::from_static(b"{}"))
            .await
            .expect_err("html must fail");

        assert!(matches!(err, UpstreamError::ResponseFormat(_)));
    }

    #[tokio::test]
    async fn transcribe_sends_file_and_model_as_multipart() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/audio/transcriptions")
                    .header("authorization", format!("Bearer {TEST_KEY}"))
                    .body_contains("fake-webm-audio-payload")
                    .body_contains("name=\"model\"")
                    .body_contains("whisper-1")
                    .body_contains("filename=\"audio.webm\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"text":"hello"}"#);
            })
            .await;

        let resp = client_for(&server)
            .transcribe(AudioUpload::new(Bytes::from_static(b"fake-webm-audio-payload")))
            .await
            .expect("transcription succeeds");

        assert_eq!(resp.body, Bytes::from_static(br#"{"text":"hello"}"#));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn speech_returns_upstream_bytes_unchanged() {
        let server = httpmock::MockServer::start_async().await;
        let audio: Vec<u8> = vec![0xFF, 0xFB, 0x90, 0x44, 0x00, 0x00, 0x80, 0xFE];
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/audio/speech")
                    .header("authorization", format!("Bearer {TEST_KEY}"));
                then.status(200)
                    .header("content-type", "audio/mpeg")
                    .body(audio.clone());
            })
            .await;

        let bytes = client_for(&server)
            .speech(Bytes::from_static(br#"{"model":"tts-1","input":"hi","voice":"alloy"}"#))
            .await
            .expect("speech succeeds");

        assert_eq!(bytes.as_ref(), audio.as_slice());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        let client = UpstreamClient::new(TEST_KEY, "http://127.0.0.1:1", Duration::from_secs(2))
            .expect("client builds");
        let err = client
            .speech(Bytes::from_static(b"{}"))
            .await
            .expect_err("connection must fail");
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
