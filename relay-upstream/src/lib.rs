//! Credential-holding HTTP client for the upstream AI provider.
//!
//! Pure HTTP client: knows the three relayed endpoints, injects the bearer
//! credential, and classifies upstream failures. No axum dependency.

mod client;
mod error;
mod openai;
mod types;

pub use client::UpstreamClient;
pub use error::{Result, UpstreamError};
pub use openai::{DEFAULT_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL};
pub use types::{AudioUpload, UpstreamEndpoint, UpstreamJson};
