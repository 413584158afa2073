//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
};
use httpwrapper::{Adapter, Catalog, Locale, TomlRegistry};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, Once};
use tower::ServiceExt;

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary
pub fn init_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("httpwrapper=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Default English catalog
pub fn locale() -> Arc<dyn Locale> {
    Arc::new(Catalog::new())
}

/// Initialized adapter built from a TOML document
pub fn adapter(toml: &str) -> Adapter {
    let registry = TomlRegistry::from_str(toml).unwrap();
    let mut adapter = Adapter::new(&registry, locale()).unwrap();
    adapter.initialize().unwrap();
    adapter
}

/// Response captured by [`TestRequest::send`]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Request builder driving a router with `oneshot`
pub struct TestRequest {
    builder: axum::http::request::Builder,
    body: String,
    peer: Option<SocketAddr>,
}

impl TestRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
            body: String::new(),
            peer: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn json(mut self, body: &str) -> Self {
        self.builder = self.builder.header("content-type", "application/json");
        self.body = body.to_string();
        self
    }

    /// Pretend the request arrived from `peer`
    pub fn peer(mut self, peer: &str) -> Self {
        self.peer = Some(peer.parse().unwrap());
        self
    }

    pub async fn send(self, router: Router) -> TestResponse {
        let mut request = self.builder.body(Body::from(self.body)).unwrap();
        if let Some(peer) = self.peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}
