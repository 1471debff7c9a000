//! Credential-injecting relay in front of the upstream AI provider.
//!
//! [`router`] / [`build_router`] give an embeddable axum [`axum::Router`];
//! [`server::serve`] is the standalone listener bootstrap used by the binary.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::RelayConfig;
pub use error::{RelayError, RelayRoute};
pub use server::{RelayState, build_router, router};
