//! Relay configuration loader.
//!
//! Defaults, then an optional TOML file, then environment overrides.

use relay_upstream::{DEFAULT_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "AI_RELAY_HOST";
pub const ENV_UPSTREAM_BASE_URL: &str = "AI_RELAY_UPSTREAM_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Credential injected into every upstream request. Usually supplied via
    /// `OPENAI_API_KEY` rather than the config file.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model id sent alongside every transcription upload.
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_upstream_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.trim().is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("UpstreamConfig")
            .field("api_key", &api_key)
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            transcription_model: default_transcription_model(),
            timeout_seconds: default_upstream_timeout_seconds(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.to_string()
}

fn default_upstream_timeout_seconds() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server-side limit on a whole request, answered with 408.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// Unset means request bodies are not size-limited.
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            http_timeout_seconds: default_http_timeout_seconds(),
            max_body_bytes: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_http_timeout_seconds() -> u64 {
    300
}

impl RelayConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_toml_file(&path).await?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    async fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
    }

    /// Environment values win over file values. Blank values are ignored.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_API_KEY) {
            self.upstream.api_key = v.trim().to_string();
        }
        if let Some(v) = non_empty(ENV_UPSTREAM_BASE_URL) {
            self.upstream.base_url = v.trim().to_string();
        }
        if let Some(v) = non_empty(ENV_HOST) {
            self.runtime.host = v.trim().to_string();
        }
        if let Some(v) = non_empty(ENV_PORT) {
            self.runtime.port = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{ENV_PORT}={v:?} is not a valid port: {e}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upstream.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "upstream.api_key is required (set {ENV_API_KEY})"
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("upstream.base_url must not be empty"));
        }
        if self.upstream.transcription_model.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "upstream.transcription_model must not be empty"
            ));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("upstream.timeout_seconds must be > 0"));
        }
        if self.runtime.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("runtime.http_timeout_seconds must be > 0"));
        }
        if self.runtime.max_body_bytes == Some(0) {
            return Err(anyhow::anyhow!("runtime.max_body_bytes must be > 0 when set"));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self.runtime.host.trim().parse().map_err(|e| {
            anyhow::anyhow!("runtime.host={:?} is not an ip address: {e}", self.runtime.host)
        })?;
        Ok(SocketAddr::new(ip, self.runtime.port))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.http_timeout_seconds)
    }
}
