//! Agent configuration structures and loading.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main agent configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    /// Observation ring capacity.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Asset store capacity.
    #[serde(default = "default_asset_buffer_size")]
    pub asset_buffer_size: usize,

    /// Upper bound a single sample request may ask for.
    #[serde(default = "default_max_sample_count")]
    pub max_sample_count: usize,

    /// Stamp every observation with agent time, ignoring adapter-supplied
    /// timestamps.
    #[serde(default)]
    pub ignore_adapter_timestamps: bool,

    /// Adapter connections to run.
    #[serde(default)]
    pub adapters: Vec<AdapterEntry>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            asset_buffer_size: default_asset_buffer_size(),
            max_sample_count: default_max_sample_count(),
            ignore_adapter_timestamps: false,
            adapters: Vec::new(),
        }
    }
}

/// How the agent reaches one adapter.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    /// Bind `endpoint` and accept the adapter's inbound connection.
    #[default]
    Listen,
    /// Dial `endpoint` and reconnect with backoff when the link drops.
    Connect,
}

/// One configured adapter connection.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdapterEntry {
    /// Device this adapter supplies. A wildcard adapter (no uuid) must
    /// qualify every line's key as `device:key`.
    #[serde(default)]
    pub device_uuid: Option<String>,

    #[serde(default)]
    pub mode: AdapterMode,

    /// Bind address (listen) or remote address (connect), `host:port`.
    pub endpoint: String,

    /// PONG timeout advertised to the adapter; after heartbeat
    /// negotiation the link is dead at twice this without traffic.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Silence timeout before any heartbeat negotiation.
    #[serde(default = "default_legacy_timeout_ms")]
    pub legacy_timeout_ms: u64,

    /// Base retry interval for connect-mode reconnection.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Re-report every data item seen on the connection as UNAVAILABLE
    /// when the connection dies.
    #[serde(default = "default_true")]
    pub mark_unavailable_on_disconnect: bool,
}

impl AdapterEntry {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn legacy_timeout(&self) -> Duration {
        Duration::from_millis(self.legacy_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

fn default_buffer_size() -> usize {
    131_072
}

fn default_asset_buffer_size() -> usize {
    1024
}

fn default_max_sample_count() -> usize {
    1000
}

fn default_heartbeat_ms() -> u64 {
    10_000
}

fn default_legacy_timeout_ms() -> u64 {
    600_000
}

fn default_reconnect_interval_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl AgentConfig {
    /// Load from an optional TOML file plus `SPINDLE_` environment
    /// overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading agent configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix("SPINDLE").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        let config: AgentConfig = settings
            .try_deserialize()
            .context("Failed to deserialize agent configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("buffer_size must be at least 1");
        }
        if self.asset_buffer_size == 0 {
            bail!("asset_buffer_size must be at least 1");
        }
        if self.max_sample_count == 0 {
            bail!("max_sample_count must be at least 1");
        }
        for (index, adapter) in self.adapters.iter().enumerate() {
            if adapter.endpoint.is_empty() {
                bail!("adapter {index} has an empty endpoint");
            }
            if adapter.heartbeat_ms == 0 {
                bail!("adapter {index} ({}) has a zero heartbeat", adapter.endpoint);
            }
            if adapter.device_uuid.as_deref() == Some("") {
                bail!(
                    "adapter {index} ({}) has an empty device uuid; omit it for wildcard mode",
                    adapter.endpoint
                );
            }
        }
        Ok(())
    }
}

/// Convenience wrapper used by the agent binary.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    AgentConfig::load(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_size, 131_072);
        assert_eq!(config.asset_buffer_size, 1024);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn loads_full_toml() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
buffer_size = 4096
ignore_adapter_timestamps = true

[[adapters]]
device_uuid = "mill-3"
mode = "connect"
endpoint = "10.0.0.5:7878"
heartbeat_ms = 5000

[[adapters]]
endpoint = "0.0.0.0:7878"
"#
        )
        .unwrap();

        let config = AgentConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.buffer_size, 4096);
        assert!(config.ignore_adapter_timestamps);
        assert_eq!(config.adapters.len(), 2);

        let first = &config.adapters[0];
        assert_eq!(first.mode, AdapterMode::Connect);
        assert_eq!(first.device_uuid.as_deref(), Some("mill-3"));
        assert_eq!(first.heartbeat(), Duration::from_secs(5));

        let second = &config.adapters[1];
        assert_eq!(second.mode, AdapterMode::Listen);
        assert!(second.device_uuid.is_none());
        assert!(second.mark_unavailable_on_disconnect);
    }

    #[test]
    fn rejects_zero_capacities_and_empty_endpoints() {
        let mut config = AgentConfig::default();
        config.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.adapters.push(AdapterEntry {
            device_uuid: None,
            mode: AdapterMode::Listen,
            endpoint: String::new(),
            heartbeat_ms: default_heartbeat_ms(),
            legacy_timeout_ms: default_legacy_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            mark_unavailable_on_disconnect: true,
        });
        assert!(config.validate().is_err());
    }
}
