//! Configuration management for the registry bootstrap
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bootstrap.toml)
//! - Environment variables (BOOTSTRAP__*)
//!
//! The registry endpoint is the one exception: it is read only from
//! `KAFKA_SCHEMA_REGISTRY_ENDPOINT` (see [`RegistryEndpoint`]).
//!
//! ## Example config file (bootstrap.toml):
//! ```toml
//! [registry]
//! request_timeout_secs = 10
//!
//! [retry]
//! budget_secs = 120
//! interval_secs = 10
//!
//! [bundle]
//! path = "./schemas"
//!
//! [mirror]
//! source_url = "https://registry.example.com/"
//! output_dir = "schemas"
//! max_depth = 5
//! pin_files = ["../.local.env", "../.schema-versions.env"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BootstrapError, Result};

/// Environment variable holding the registry base URL
pub const ENDPOINT_ENV: &str = "KAFKA_SCHEMA_REGISTRY_ENDPOINT";

/// Main configuration for the bootstrap and mirror tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Registry client settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Coordinator retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Bundle override
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Mirror settings
    #[serde(default)]
    pub mirror: MirrorConfig,
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Per-request timeout, so a stuck probe cannot eat the whole budget
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Coordinator retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total time allowed before giving up
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,

    /// Sleep before every probe
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Bundled schema configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Read schemas from this directory instead of the embedded bundle
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Registry to copy schemas from
    #[serde(default)]
    pub source_url: Option<String>,

    /// Root of the bundled tree to write
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of levels cleaned and allowed for nested references
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Env files holding subject names and version pins, read in order
    #[serde(default = "default_pin_files")]
    pub pin_files: Vec<PathBuf>,
}

// Default value functions
fn default_request_timeout_secs() -> u64 {
    10
}

fn default_budget_secs() -> u64 {
    120
}

fn default_interval_secs() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_max_depth() -> usize {
    5
}

fn default_pin_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("../.local.env"),
        PathBuf::from("../.schema-versions.env"),
    ]
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            budget_secs: default_budget_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            output_dir: default_output_dir(),
            max_depth: default_max_depth(),
            pin_files: default_pin_files(),
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BootstrapConfig {
    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["bootstrap.toml", ".bootstrap.toml", "config/bootstrap.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "registry", "bootstrap") {
            let xdg_config = config_dir.config_dir().join("bootstrap.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // BOOTSTRAP__RETRY__BUDGET_SECS=60 and friends
        builder = builder.add_source(
            Environment::with_prefix("BOOTSTRAP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

/// Base URL of the registry being bootstrapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint(Url);

impl RegistryEndpoint {
    /// Read `KAFKA_SCHEMA_REGISTRY_ENDPOINT` through a variable lookup,
    /// e.g. `|key| std::env::var(key).ok()`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        match lookup(ENDPOINT_ENV) {
            Some(value) if !value.is_empty() => Self::parse(&value),
            _ => Err(BootstrapError::MissingEnv(ENDPOINT_ENV.to_string())),
        }
    }

    /// Parse a base URL; it must be able to carry path segments
    pub fn parse(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|e| BootstrapError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(BootstrapError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        Ok(Self(url))
    }

    /// Append path segments, percent-encoding each one
    pub fn join<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.0.clone();
        // cannot fail: checked in parse()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl std::fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
