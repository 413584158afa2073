//! Configuration management for the HTTP service adapter
//!
//! This module handles locating the configuration document and exposing
//! its sections as typed settings.

pub mod loader;
pub mod registry;
pub mod settings;

pub use loader::ConfigLoader;
pub use registry::{Registry, TomlRegistry};
pub use settings::{LoggingSettings, ServiceConfig};
