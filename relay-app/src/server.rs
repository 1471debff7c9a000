//! Relay server.
//!
//! `router` builds the complete relay without touching the network, so it can
//! be embedded in a host or driven directly in tests. `serve` is the optional
//! standalone bootstrap that binds a listener around it.

use crate::config::{RelayConfig, RuntimeConfig};
use crate::routes;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use relay_upstream::UpstreamClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared, read-only state handed to every handler.
#[derive(Debug)]
pub struct RelayState {
    pub upstream: UpstreamClient,
    pub started_at: Instant,
}

impl RelayState {
    pub fn from_config(cfg: &RelayConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(
            &cfg.upstream.api_key,
            &cfg.upstream.base_url,
            cfg.upstream_timeout(),
        )?
        .with_transcription_model(&cfg.upstream.transcription_model)?;
        Ok(Self {
            upstream,
            started_at: Instant::now(),
        })
    }
}

/// Build the relay router from configuration.
pub fn build_router(cfg: &RelayConfig) -> Result<Router> {
    let state = Arc::new(RelayState::from_config(cfg)?);
    Ok(router(state, &cfg.runtime))
}

/// Assemble routes and HTTP middleware around an existing state.
pub fn router(state: Arc<RelayState>, runtime: &RuntimeConfig) -> Router {
    let body_limit = match runtime.max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    routes::router()
        .layer(Extension(state))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(runtime.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub fn doctor(cfg: &RelayConfig) -> Result<()> {
    let state = RelayState::from_config(cfg)?;
    let addr = cfg.bind_addr()?;
    tracing::info!(
        bind_addr = %addr,
        upstream = ?state.upstream,
        runtime_http_timeout_seconds = cfg.runtime.http_timeout_seconds,
        runtime_max_body_bytes = ?cfg.runtime.max_body_bytes,
        "config ok"
    );
    Ok(())
}

pub async fn serve(cfg: RelayConfig) -> Result<()> {
    let addr = cfg.bind_addr()?;
    tracing::info!(
        bind_addr = %addr,
        upstream = ?cfg.upstream,
        runtime_http_timeout_seconds = cfg.runtime.http_timeout_seconds,
        runtime_max_body_bytes = ?cfg.runtime.max_body_bytes,
        "server configuration loaded"
    );
    let app = build_router(&cfg)?;
    let listener = bind_listener(addr).await?;

    tracing::info!(%addr, "ai-relay serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("http server shutdown completed");
    Ok(())
}

async fn bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "listener bound");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
}
