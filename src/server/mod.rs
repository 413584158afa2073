//! HTTP server implementation
//!
//! The adapter wraps axum behind a gin-style handler chain: routes are
//! registered as ordered lists of [`Handler`]s, each receiving a
//! [`RequestContext`] for the request in flight.

pub mod adapter;
pub mod context;
pub mod group;
pub mod proxy;
pub mod routes;

pub use adapter::{Adapter, CONFIG_SECTION};
pub use context::{Context, Handler, JSON_CONTENT_TYPE, RequestContext, RequestContextExt, handler};
pub use group::RouteGroup;
pub use proxy::{IpRange, TrustedProxies};
pub use routes::{Mode, PathParam, Route, Verb};
