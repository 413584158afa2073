//! httpwrapper - HTTP service adapter
//!
//! A small HTTP service layer over axum with a gin-style programming model:
//! routes carry ordered handler chains, handlers see the request through a
//! [`RequestContext`], and route groups share a path prefix.
//!
//! # Features
//!
//! - **Registry-driven configuration**: the `[http]` section of a TOML
//!   registry selects host, port, mode, trusted proxies and body limit
//! - **Localized operator messages**: start-up and failure text comes from a
//!   [`Locale`]
//! - **Typed start-up errors**: configuration, initialization and listen
//!   failures are returned as [`StartupError`] after being logged
//! - **Handler chains**: `next`, `abort` and JSON helpers in the gin manner
//!
//! # Usage
//!
//! ```bash
//! httpwrapper serve --port 8080 --host 0.0.0.0
//! ```
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use httpwrapper::{Adapter, Catalog, RequestContextExt, TomlRegistry, handler};
//! use axum::http::StatusCode;
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry: TomlRegistry = "[http]\nport = 8080".parse()?;
//! let mut adapter = Adapter::new(&registry, Arc::new(Catalog::new()))?;
//! adapter.initialize()?;
//!
//! adapter
//!     .route_group("/api")
//!     .get("/users/:id", [handler(|ctx| {
//!         let id = ctx.param("id");
//!         ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
//!     })]);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod locale;
pub mod server;
pub mod utils;

pub use config::{ConfigLoader, LoggingSettings, Registry, ServiceConfig, TomlRegistry};
pub use error::{Error, Result, StartupError};
pub use locale::{Catalog, Locale};
pub use server::{
    Adapter, Handler, Mode, RequestContext, RequestContextExt, RouteGroup, Verb, handler,
};
