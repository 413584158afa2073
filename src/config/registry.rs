//! Configuration registry
//!
//! A [`Registry`] hands typed configuration sections to the components that
//! need them. [`TomlRegistry`] is the file/environment backed implementation.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use toml::{Table, Value};
use tracing::debug;

/// Source of typed configuration sections
pub trait Registry {
    /// Deserialize `section` into `T`.
    ///
    /// A missing section behaves like an empty one, so serde defaults apply.
    fn parse<T: DeserializeOwned>(&self, section: &str) -> Result<T>;
}

/// Registry backed by a TOML document
#[derive(Debug, Clone, Default)]
pub struct TomlRegistry {
    table: Table,
}

impl TomlRegistry {
    /// Registry with no sections
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a TOML document from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config("file", &format!("Failed to read config file: {}", e))
        })?;
        content.parse()
    }

    /// Apply `PREFIX_SECTION_KEY=value` environment variables.
    ///
    /// Section and key are lower-cased; the key keeps its remaining
    /// underscores (`APP_HTTP_SHUTDOWN_TIMEOUT` sets `http.shutdown_timeout`).
    pub fn with_env_overrides(self, prefix: &str) -> Self {
        self.with_overrides(prefix, std::env::vars())
    }

    /// Apply overrides from an explicit variable list
    pub fn with_overrides<I>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}_", prefix.to_uppercase());

        for (name, raw) in vars {
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some((section, key)) = rest.split_once('_') else {
                continue;
            };
            if section.is_empty() || key.is_empty() {
                continue;
            }

            let (section, key) = (section.to_lowercase(), key.to_lowercase());
            debug!("Applying environment override {}.{}", section, key);
            self = self.with_value(&section, &key, typed_value(&raw));
        }

        self
    }

    /// Set `section.key`, replacing a non-table section
    pub fn with_value(mut self, section: &str, key: &str, value: impl Into<Value>) -> Self {
        let entry = self
            .table
            .entry(section)
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(table) = entry {
            table.insert(key.to_string(), value.into());
        }
        self
    }

    /// Whether a section is present
    pub fn has_section(&self, section: &str) -> bool {
        self.table.contains_key(section)
    }
}

impl std::str::FromStr for TomlRegistry {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        let table = toml::from_str::<Table>(content)?;
        Ok(Self { table })
    }
}

impl Registry for TomlRegistry {
    fn parse<T: DeserializeOwned>(&self, section: &str) -> Result<T> {
        let value = match self.table.get(section) {
            Some(value) => value.clone(),
            None => Value::Table(Table::new()),
        };

        value
            .try_into()
            .map_err(|e: toml::de::Error| Error::config(section, &e.to_string()))
    }
}

fn typed_value(raw: &str) -> Value {
    if let Ok(number) = raw.parse::<i64>() {
        Value::Integer(number)
    } else if let Ok(number) = raw.parse::<f64>() {
        Value::Float(number)
    } else if let Ok(flag) = raw.parse::<bool>() {
        Value::Boolean(flag)
    } else {
        Value::String(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use std::io::Write;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_section() {
        let registry = TomlRegistry::from_str(
            r#"
[http]
host = "localhost"
port = "8081"
            "#,
        )
        .unwrap();

        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config.address(), "localhost:8081");
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let registry = TomlRegistry::empty();
        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let result = TomlRegistry::from_str("[http\nhost = ");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_wrong_type_is_config_error() {
        let registry = TomlRegistry::from_str("[http]\ndevelopment = \"yes\"").unwrap();
        let result = registry.parse::<ServiceConfig>("http");
        match result {
            Err(Error::Config { field, .. }) => assert_eq!(field, "http"),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides_are_typed() {
        let registry = TomlRegistry::from_str("[http]\nhost = \"a\"")
            .unwrap()
            .with_overrides(
                "app",
                vars(&[
                    ("APP_HTTP_PORT", "7000"),
                    ("APP_HTTP_DEVELOPMENT", "true"),
                    ("APP_HTTP_SHUTDOWN_TIMEOUT", "9"),
                    ("OTHER_HTTP_HOST", "ignored"),
                ]),
            );

        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config.host, "a");
        assert_eq!(config.port, "7000");
        assert!(config.development);
        assert_eq!(config.shutdown_timeout.as_secs(), 9);
    }

    #[test]
    fn test_list_override_from_environment_text() {
        let registry = TomlRegistry::from_str("[http]\ntrusted_proxies = [\"::1\"]")
            .unwrap()
            .with_overrides(
                "app",
                vars(&[("APP_HTTP_TRUSTED_PROXIES", "10.0.0.0/8,172.16.0.0/12")]),
            );

        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config.trusted_proxies, vec!["10.0.0.0/8", "172.16.0.0/12"]);
    }

    #[test]
    fn test_overrides_create_missing_sections() {
        let registry =
            TomlRegistry::empty().with_overrides("app", vars(&[("APP_LOGGING_LEVEL", "debug")]));
        assert!(registry.has_section("logging"));
        assert!(!registry.has_section("http"));
    }

    #[test]
    fn test_with_value_replaces_scalar_section() {
        let registry = TomlRegistry::from_str("http = 3")
            .unwrap()
            .with_value("http", "host", "10.1.1.1");

        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config.host, "10.1.1.1");
    }

    #[test]
    fn test_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[http]\nport = 8443").unwrap();

        let registry = TomlRegistry::from_file(temp_file.path()).unwrap();
        let config: ServiceConfig = registry.parse("http").unwrap();
        assert_eq!(config.port, "8443");
    }
}
