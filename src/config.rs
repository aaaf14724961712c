//! Configuration module for relaychain
//!
//! JSON configuration for logging, the local dialer and listener defaults.
//! Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::dialer::NetDialer;
use crate::error::{Error, Result};
use crate::transport::BindOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Local dialer options
    #[serde(default)]
    pub dialer: DialerConfig,

    /// Listener defaults
    #[serde(default)]
    pub bind: BindConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: pretty, compact, json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Per-module level overrides, e.g. {"relaychain::udp": "debug"}
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            filters: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directive string: base level then per-module overrides
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut filters: Vec<_> = self.filters.iter().collect();
        filters.sort();
        for (module, level) in filters {
            directives.push(',');
            directives.push_str(module);
            directives.push('=');
            directives.push_str(level);
        }
        directives
    }
}

/// Local dialer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Interface name or local IP for outbound sockets
    #[serde(default)]
    pub interface: Option<String>,

    /// Firewall mark, 0 = unset
    #[serde(default)]
    pub mark: u32,

    /// Dial timeout in seconds, 0 = default
    #[serde(default)]
    pub timeout_secs: u64,
}

impl DialerConfig {
    pub fn to_net_dialer(&self) -> NetDialer {
        let mut netd = NetDialer::new()
            .with_mark(self.mark)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(interface) = &self.interface {
            netd = netd.with_interface(interface.as_str());
        }
        netd
    }
}

/// Listener defaults. Zero values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindConfig {
    #[serde(default)]
    pub backlog: usize,

    #[serde(default)]
    pub udp_data_queue_size: usize,

    #[serde(default)]
    pub udp_data_buffer_size: usize,

    #[serde(default)]
    pub udp_conn_ttl_secs: u64,
}

impl BindConfig {
    pub fn to_bind_options(&self) -> BindOptions {
        BindOptions::new()
            .with_backlog(self.backlog)
            .with_udp_data_queue_size(self.udp_data_queue_size)
            .with_udp_data_buffer_size(self.udp_data_buffer_size)
            .with_udp_conn_ttl(Duration::from_secs(self.udp_conn_ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::DEFAULT_TIMEOUT;
    use crate::transport::{DEFAULT_BACKLOG, DEFAULT_UDP_CONN_TTL};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "pretty");

        let netd = config.dialer.to_net_dialer();
        assert_eq!(netd.timeout(), DEFAULT_TIMEOUT);
        assert!(netd.interface().is_none());

        let opts = config.bind.to_bind_options();
        assert_eq!(opts.backlog_or_default(), DEFAULT_BACKLOG);
        assert_eq!(opts.udp_conn_ttl_or_default(), DEFAULT_UDP_CONN_TTL);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "log": {"level": "debug", "format": "json", "filters": {"relaychain::udp": "trace"}},
                "dialer": {"interface": "eth0", "mark": 255, "timeout_secs": 3},
                "bind": {"backlog": 2, "udp_data_queue_size": 1, "udp_conn_ttl_secs": 60}
            }"#,
        )
        .unwrap();

        assert_eq!(config.log.directives(), "debug,relaychain::udp=trace");

        let netd = config.dialer.to_net_dialer();
        assert_eq!(netd.interface(), Some("eth0"));
        assert_eq!(netd.mark(), 255);
        assert_eq!(netd.timeout(), Duration::from_secs(3));

        let opts = config.bind.to_bind_options();
        assert_eq!(opts.backlog_or_default(), 2);
        assert_eq!(opts.udp_data_queue_size_or_default(), 1);
        assert_eq!(opts.udp_conn_ttl_or_default(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_json() {
        let err = Config::from_json("{\"bind\": []}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed = Config::from_json(&json).unwrap();
        assert_eq!(parsed.log.level, config.log.level);
    }
}
