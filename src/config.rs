//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{self, ClientConfig};
use crate::poller::PollerConfig;
use crate::store::{DocumentStore, MemoryStore, SqliteStore, StoreError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub poller: PollerSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    #[serde(default = "default_expose_error_stack")]
    pub expose_error_stack: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_expose_error_stack() -> bool {
    true
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            expose_error_stack: default_expose_error_stack(),
        }
    }
}

impl ApiSection {
    pub fn to_api_config(&self) -> crate::api::ApiConfig {
        crate::api::ApiConfig {
            host: self.host.clone(),
            port: self.port,
            max_body_size: self.max_body_size,
            expose_error_stack: self.expose_error_stack,
        }
    }
}

/// Which document store backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ConfigError::InvalidValue {
                key: "store.backend".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("globetalk").to_string_lossy().to_string())
        .unwrap_or_else(|| "./globetalk_data".to_string())
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl StoreSection {
    /// Open the configured backend
    pub fn open(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(Path::new(&self.data_dir))?)),
        }
    }
}

/// API client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_client_timeout")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    ClientConfig::default().base_url
}

fn default_client_timeout() -> u64 {
    ClientConfig::default().request_timeout_ms
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_client_timeout(),
        }
    }
}

impl ClientSection {
    pub fn to_client_config(&self) -> ClientConfig {
        self.to_client_config_with(None)
    }

    /// Client settings with `base_url` replaced when one is given
    pub fn to_client_config_with(&self, base_url: Option<String>) -> ClientConfig {
        ClientConfig {
            base_url: base_url.unwrap_or_else(|| self.base_url.clone()),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Chat poller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollerSection {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    PollerConfig::default().interval_ms
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl PollerSection {
    pub fn to_poller_config(&self) -> PollerConfig {
        self.to_poller_config_with(None)
    }

    pub fn to_poller_config_with(&self, interval_ms: Option<u64>) -> PollerConfig {
        PollerConfig {
            interval_ms: interval_ms.unwrap_or(self.interval_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        format!("globetalk={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let (config, source) = Self::discover();
        source.log();
        config
    }

    /// Load from the first readable default location. Nothing is logged;
    /// call [`ConfigSource::log`] once tracing is up.
    pub fn discover() -> (Self, ConfigSource) {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("globetalk").join("config.toml")),
            Some(PathBuf::from("/etc/globetalk/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::discover_in(&config_paths)
    }

    /// Like [`Config::discover`], over an explicit list of candidate paths
    pub fn discover_in(paths: &[PathBuf]) -> (Self, ConfigSource) {
        let mut failures = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    let source = ConfigSource {
                        path: Some(path.clone()),
                        failures,
                    };
                    return (config, source);
                }
                Err(e) => failures.push(e),
            }
        }

        let source = ConfigSource {
            path: None,
            failures,
        };
        (Self::from_env(), source)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = lookup("GLOBETALK_API_HOST") {
            self.api.host = host;
        }
        let port = lookup("GLOBETALK_API_PORT").or_else(|| lookup("PORT"));
        if let Some(port) = port {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid port"),
            }
        }

        // Store overrides
        if let Some(backend) = lookup("GLOBETALK_STORE") {
            match backend.parse() {
                Ok(b) => self.store.backend = b,
                Err(e) => tracing::warn!("{}", e),
            }
        }
        if let Some(data_dir) = lookup("GLOBETALK_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        // Client overrides
        if let Some(url) = client::BASE_URL_VARS
            .iter()
            .filter_map(|var| lookup(*var))
            .find(|url| !url.is_empty())
        {
            self.client.base_url = url;
        }

        // Logging overrides
        if let Some(level) = lookup("GLOBETALK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("GLOBETALK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Outcome of config file discovery
#[derive(Debug, Default)]
pub struct ConfigSource {
    /// File the config was read from, `None` when only defaults and
    /// environment variables apply
    pub path: Option<PathBuf>,
    /// Files that existed but could not be loaded
    pub failures: Vec<ConfigError>,
}

impl ConfigSource {
    pub fn log(&self) {
        for error in &self.failures {
            tracing::warn!("Failed to load config: {}", error);
        }
        match &self.path {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# GlobeTalk Configuration
#
# Environment variables override these settings:
# - GLOBETALK_API_HOST
# - GLOBETALK_API_PORT (or PORT)
# - GLOBETALK_STORE
# - GLOBETALK_DATA_DIR
# - NEXT_PUBLIC_API_URL (or GLOBETALK_API_URL)
# - GLOBETALK_LOG_LEVEL
# - GLOBETALK_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 5000

# Maximum request body size (bytes)
max_body_size = 1048576

# Include the error cause chain in failed report responses
expose_error_stack = true

[store]
# Document store backend: memory or sqlite
backend = "memory"

# Directory for the SQLite database file
data_dir = "~/.local/share/globetalk"

[client]
# Base URL of the GlobeTalk backend
base_url = "http://localhost:5000"

# Request timeout (ms)
request_timeout_ms = 10000

[poller]
# How often a watched chat is re-fetched (ms)
interval_ms = 3000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
