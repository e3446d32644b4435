use crate::connection::IceServer;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Config file looked up when no explicit path is given (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config/tambourine";

/// Prefix for environment overrides, e.g. `TAMBOURINE_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "TAMBOURINE";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            shutdown: ShutdownConfig::default(),
            providers: ProvidersConfig::default(),
            ice_servers: default_ice_servers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Bound for each shutdown step (task cancellation, disconnects)
    pub timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    /// Preferred STT provider name, if any
    #[serde(default)]
    pub default_stt: Option<String>,

    /// Preferred LLM provider name, if any
    #[serde(default)]
    pub default_llm: Option<String>,

    #[serde(default)]
    pub stt: HashMap<String, ProviderCredentials>,

    #[serde(default)]
    pub llm: HashMap<String, ProviderCredentials>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Endpoint override for self-hosted providers
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    /// A provider is usable once it has a non-empty key or a local endpoint
    pub fn is_configured(&self) -> bool {
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        let has_url = self.base_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        has_key || has_url
    }
}

fn default_ice_servers() -> Vec<IceServer> {
    vec![IceServer::new("stun:stun.l.google.com:19302")]
}

impl Settings {
    /// Load settings from an optional file layered under environment overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::with_name(path),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
