//! Runtime configuration for the gNMI target.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support via `CONFIG_PATH`
//! - Environment variable overrides (highest priority)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::Error;
use crate::errors::Result;


/// Main configuration container for the target.
///
/// Configuration sources are merged in the following order (later sources
/// override earlier ones):
/// 1. Type defaults (lowest priority)
/// 2. Configuration file from the `CONFIG_PATH` environment variable
/// 3. Environment variables with the `TARGET__` prefix (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TargetConfig {
    /// Listening endpoint and startup-config source
    pub server: ServerConfig,
    /// Queue and ring capacities
    pub limits: LimitsConfig,
    /// Background writer cadence
    pub telemetry: TelemetryConfig,
}

impl TargetConfig {
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("TARGET")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-component configuration rules.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.limits.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind to `address:port` or just `:port`
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Optional IETF-JSON file loaded as the startup configuration; absent
    /// means the tree starts empty
    #[serde(default)]
    pub startup_config: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            startup_config: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.listen_address().map(|_| ())
    }

    /// The socket address to listen on; a bare `:port` binds every
    /// interface.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let normalized = if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address)
        } else {
            self.bind_address.clone()
        };
        normalized.parse().map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "invalid bind_address {:?}: {e}",
                self.bind_address
            )))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Per-client update queue capacity
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,

    /// Config-update ring capacity
    #[serde(default = "default_config_event_ring_capacity")]
    pub config_event_ring_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            client_queue_capacity: default_client_queue_capacity(),
            config_event_ring_capacity: default_config_event_ring_capacity(),
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_queue_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "client_queue_capacity must be greater than 0".into(),
            )));
        }
        if self.config_event_ring_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "config_event_ring_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Seconds between datetime heartbeat writes
    #[serde(default = "default_datetime_interval")]
    pub datetime_interval_secs: u64,

    /// Seconds between synthetic random-telemetry emissions
    #[serde(default = "default_random_event_interval")]
    pub random_event_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            datetime_interval_secs: default_datetime_interval(),
            random_event_interval_secs: default_random_event_interval(),
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.datetime_interval_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "datetime_interval_secs must be greater than 0".into(),
            )));
        }
        if self.random_event_interval_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "random_event_interval_secs must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

// Default value implementations
fn default_bind_address() -> String {
    ":10161".to_string()
}
fn default_client_queue_capacity() -> usize {
    crate::constants::CLIENT_QUEUE_CAPACITY
}
fn default_config_event_ring_capacity() -> usize {
    crate::constants::CONFIG_EVENT_RING_CAPACITY
}
fn default_datetime_interval() -> u64 {
    crate::constants::DATETIME_WRITE_INTERVAL.as_secs()
}
fn default_random_event_interval() -> u64 {
    crate::constants::RANDOM_EVENT_INTERVAL.as_secs()
}
