use crate::error::{RelayError, RelayRoute};
use crate::routes::chat::json_reply;
use crate::server::RelayState;
use axum::Extension;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartRejection;
use axum::response::Response;
use axum::routing::post;
use relay_upstream::AudioUpload;
use std::sync::Arc;

const FILE_FIELD: &str = "file";

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/whisper", post(relay_whisper))
}

#[tracing::instrument(level = "info", skip_all)]
async fn relay_whisper(
    Extension(state): Extension<Arc<RelayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RelayError> {
    // A request that is not multipart at all simply has no file.
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(rejection = %rejection, "whisper request is not multipart");
            return Err(RelayError::NoFileUploaded);
        }
    };
    let Some(upload) = read_file_field(multipart).await? else {
        return Err(RelayError::NoFileUploaded);
    };
    tracing::info!(audio_bytes = upload.len(), "whisper upload received");

    let reply = state
        .upstream
        .transcribe(upload)
        .await
        .map_err(RelayError::upstream(RelayRoute::Whisper))?;
    Ok(json_reply(reply))
}

/// First part named `file` that carries a filename. Plain text fields with the
/// same name do not count as an upload.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<AudioUpload>, RelayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::InvalidMultipart(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RelayError::InvalidMultipart(e.to_string()))?;
        return Ok(Some(AudioUpload::new(bytes)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{TEST_KEY, json_request, relay_for, response_bytes};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "relay-test-boundary";

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/whisper")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn whisper_without_file_is_400_and_never_calls_upstream() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200).body(r#"{"text":"unexpected"}"#);
            })
            .await;

        let response = relay_for(&server)
            .oneshot(multipart_request(&[("language", None, "en")]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_bytes(response).await.as_ref(), b"No file uploaded");
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn whisper_text_field_named_file_is_not_an_upload() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200).body("{}");
            })
            .await;

        let response = relay_for(&server)
            .oneshot(multipart_request(&[("file", None, "not a file")]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn whisper_non_multipart_body_is_400() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200).body("{}");
            })
            .await;

        let response = relay_for(&server)
            .oneshot(json_request("/api/whisper", r#"{"file":"abc"}"#))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn whisper_forwards_exact_file_with_fixed_model() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/audio/transcriptions")
                    .header("authorization", format!("Bearer {TEST_KEY}"))
                    .body_contains("webm-bytes-0123456789")
                    .body_contains("name=\"model\"")
                    .body_contains("whisper-1")
                    .body_contains("filename=\"audio.webm\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"text":"hello world"}"#);
            })
            .await;

        let response = relay_for(&server)
            .oneshot(multipart_request(&[
                ("language", None, "en"),
                ("file", Some("clip.webm"), "webm-bytes-0123456789"),
            ]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_bytes(response).await.as_ref(),
            br#"{"text":"hello world"}"#
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn whisper_upstream_failure_is_generic_500() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/audio/transcriptions");
                then.status(400)
                    .body(r#"{"error":{"message":"Invalid file format."}}"#);
            })
            .await;

        let response = relay_for(&server)
            .oneshot(multipart_request(&[(
                "file",
                Some("clip.webm"),
                "definitely not audio",
            )]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response_bytes(response).await;
        assert_eq!(bytes.as_ref(), b"Whisper API Error");
    }
}
