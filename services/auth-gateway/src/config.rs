//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the WPE_HEADLESS_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking it.

use common::Secret;
use headless_auth::HeadlessConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Env var holding the headless client secret.
pub const SECRET_ENV_VAR: &str = "WPE_HEADLESS_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

/// Headless WordPress backend settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Timeout for calls to the backend authorize endpoint
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. WPE_HEADLESS_SECRET env var
    /// 2. client_secret_file path from config
    ///
    /// A missing secret is not a load error: the gateway still serves
    /// /health and answers exchanges with a configuration error.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.backend.url.starts_with("http://") && !config.backend.url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "backend url must start with http:// or https://, got: {}",
                config.backend.url
            )));
        }
        // The URL also names the refresh-token cookie, so normalize it once
        let trimmed = config.backend.url.trim_end_matches('/').len();
        config.backend.url.truncate(trimmed);

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            config.backend.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.backend.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.backend.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("headless-auth-gateway.toml")
    }

    /// Connection settings handed to each request's token manager.
    pub fn headless(&self) -> HeadlessConfig {
        let config = HeadlessConfig::new(self.backend.url.clone());
        match &self.backend.client_secret {
            Some(secret) => config.with_client_secret(secret.clone()),
            None => config,
        }
    }
}
