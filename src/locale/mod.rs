//! Localized operator messages
//!
//! The adapter never hard-codes the text it prints at start-up or failure;
//! it asks a [`Locale`] for it by key.

use crate::{Result, config::Registry};
use std::collections::HashMap;

/// Message key for configuration parse failures
pub const HTTP_CONFIG_ERR: &str = "http_config_err";
/// Message key for initialization failures
pub const HTTP_INIT_ERR: &str = "http_init_err";
/// Message key for the start-up announcement
pub const HTTP_START: &str = "http_start";
/// Message key for listen/serve failures
pub const HTTP_SERVE_ERR: &str = "http_serve_err";

/// Message lookup capability
pub trait Locale: Send + Sync {
    /// Message for `key`
    fn get(&self, key: &str) -> String;
}

/// In-memory message table
#[derive(Debug, Clone)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Catalog holding the built-in English messages
    pub fn new() -> Self {
        let messages = [
            (HTTP_CONFIG_ERR, "failed to parse http service configuration"),
            (HTTP_INIT_ERR, "failed to initialize http service"),
            (HTTP_START, "http service is starting"),
            (HTTP_SERVE_ERR, "http service stopped serving"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self { messages }
    }

    /// Built-in messages overridden by the registry's `[messages]` section
    pub fn from_registry<R: Registry>(registry: &R) -> Result<Self> {
        let overrides: HashMap<String, String> = registry.parse("messages")?;
        Ok(Self::new().with_messages(overrides))
    }

    /// Add or replace messages
    pub fn with_messages<I, K, V>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.messages
            .extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Locale for Catalog {
    fn get(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
