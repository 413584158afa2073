//! Configuration sections
//!
//! Typed views over the `[http]` and `[logging]` registry sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// Helper functions for serde defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

// Trust every peer
fn default_trusted_proxies() -> Vec<String> {
    vec!["0.0.0.0/0".to_string(), "::/0".to_string()]
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// Duration serialization module
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Ports show up as strings in files and as integers once typed by env overrides
mod string_or_number {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        })
    }
}

// Lists come from files as arrays and from env overrides as comma-separated text
mod string_or_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    pub fn serialize<S>(values: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::List(values) => values,
            Raw::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// HTTP service configuration, read from the `[http]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind, kept textual as it is joined straight into `host:port`
    #[serde(with = "string_or_number", default = "default_port")]
    pub port: String,
    /// Development mode keeps the engine verbose
    #[serde(default)]
    pub development: bool,
    /// Accepted but not acted on: the server has no graceful shutdown path
    #[serde(with = "duration_secs", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
    /// Peers whose forwarding headers are believed (IPs or CIDR ranges)
    #[serde(with = "string_or_list", default = "default_trusted_proxies")]
    pub trusted_proxies: Vec<String>,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            development: false,
            shutdown_timeout: default_shutdown_timeout(),
            trusted_proxies: default_trusted_proxies(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServiceConfig {
    /// `host:port` as handed to the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(crate::Error::config("host", "Host cannot be empty"));
        }

        if let Err(e) = self.port.parse::<u16>() {
            return Err(crate::Error::config(
                "port",
                &format!("Invalid port '{}': {}", self.port, e),
            ));
        }

        if self.trusted_proxies.iter().any(|p| p.trim().is_empty()) {
            return Err(crate::Error::config(
                "trusted_proxies",
                "Trusted proxy entries cannot be empty",
            ));
        }

        if self.max_body_size == 0 {
            return Err(crate::Error::config(
                "max_body_size",
                "Maximum body size cannot be 0",
            ));
        }

        Ok(())
    }
}

/// Logging configuration, read from the `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// Validate logging settings
    pub fn validate(&self) -> crate::Result<()> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "level",
                    &format!("Invalid log level: {}", self.level),
                ));
            }
        }

        match self.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(crate::Error::config(
                "format",
                &format!("Invalid log format: {}", other),
            )),
        }
    }

    /// Whether records should be emitted as JSON
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}
