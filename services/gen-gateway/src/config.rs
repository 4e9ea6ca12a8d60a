//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The account store API key is loaded from the STORE_API_KEY env var or
//! api_key_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub upstream: UpstreamConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Account data store settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the API key (alternative to STORE_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

/// Upstream generation provider settings
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    pub video_base_url: String,
    pub image_base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn require_http_url(name: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. STORE_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http_url("store.base_url", &config.store.base_url)?;
        require_http_url("upstream.video_base_url", &config.upstream.video_base_url)?;
        require_http_url("upstream.image_base_url", &config.upstream.image_base_url)?;

        if config.upstream.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Resolve API key: env var takes precedence over file
        if let Ok(key) = std::env::var("STORE_API_KEY") {
            config.store.api_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.store.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.store.api_key = Some(Secret::new(key));
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
        PathBuf::from("gen-gateway.toml")
    }
}
