//! Per-request context
//!
//! Handlers only ever see `&mut dyn RequestContext`. The axum-backed
//! [`Context`] buffers the request body, runs the handler chain and turns
//! whatever the chain wrote into an axum [`Response`].

use axum::{
    body::{Body, Bytes},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::CONTENT_TYPE,
        request::Parts,
    },
    response::Response,
};
use serde::{Serialize, de::DeserializeOwned};
use std::net::IpAddr;
use std::sync::Arc;

/// Content type written by the JSON helpers
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// Large enough that no realistic chain reaches it
const ABORT_INDEX: usize = usize::MAX / 2;

/// A request handler. Handlers produce no value; they act on the context.
pub type Handler = Arc<dyn Fn(&mut dyn RequestContext) + Send + Sync>;

/// Wrap a function or closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut dyn RequestContext) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Capability interface every handler is written against.
///
/// Accessors return an empty string when the value is absent. Generic JSON
/// helpers live on [`RequestContextExt`] so this trait stays object safe.
pub trait RequestContext {
    /// Request method
    fn method(&self) -> &str;

    /// Request path, without the query string
    fn path(&self) -> &str;

    /// Path parameter captured by the route pattern.
    ///
    /// A `*name` catch-all yields the rest of the path with its leading `/`.
    fn param(&self, key: &str) -> String;

    /// First value of a query string parameter, percent-decoded
    fn query(&self, key: &str) -> String;

    /// Request header value
    fn header(&self, key: &str) -> String;

    /// Client address, honouring forwarding headers from trusted proxies
    fn client_ip(&self) -> String;

    /// Raw request body
    fn body(&self) -> &[u8];

    /// Status of the response written so far (200 until something is written)
    fn status(&self) -> StatusCode;

    /// Set a response header; invalid names or values are ignored
    fn set_header(&mut self, key: &str, value: &str);

    /// Write a response body. The first write fixes the status.
    fn write(&mut self, status: StatusCode, content_type: &str, body: &[u8]);

    /// Stop the remaining handlers of the chain from running
    fn abort(&mut self);

    /// Whether the chain has been aborted
    fn is_aborted(&self) -> bool;

    /// Run the remaining handlers of the chain before returning
    fn next(&mut self);

    /// Write `status` with an empty body and abort
    fn abort_with_status(&mut self, status: StatusCode) {
        self.write(status, "", &[]);
        self.abort();
    }
}

/// JSON helpers available on every [`RequestContext`]
pub trait RequestContextExt: RequestContext {
    /// Deserialize the body; on failure abort with 400 and return the error
    fn bind_json<T: DeserializeOwned>(&mut self) -> Result<T, serde_json::Error> {
        let result = self.should_bind_json();
        if let Err(e) = &result {
            tracing::debug!("Rejecting request body: {}", e);
            self.abort_with_status(StatusCode::BAD_REQUEST);
        }
        result
    }

    /// Deserialize the body, leaving the response untouched
    fn should_bind_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body())
    }

    /// Serialize `payload` as the response body
    fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, payload: &T) {
        match serde_json::to_vec(payload) {
            Ok(body) => self.write(status, JSON_CONTENT_TYPE, &body),
            Err(e) => {
                tracing::error!("Failed to serialize JSON response: {}", e);
                self.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    /// Write `payload` and abort the chain
    fn abort_with_status_json<T: Serialize + ?Sized>(&mut self, status: StatusCode, payload: &T) {
        self.abort();
        self.json(status, payload);
    }
}

impl<C: RequestContext + ?Sized> RequestContextExt for C {}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    written: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            written: false,
        }
    }
}

/// axum-backed [`RequestContext`]
pub struct Context {
    parts: Parts,
    body: Bytes,
    params: Vec<(String, String)>,
    client_ip: Option<IpAddr>,
    chain: Arc<[Handler]>,
    index: usize,
    response: ResponseState,
}

impl Context {
    pub(crate) fn new(
        parts: Parts,
        body: Bytes,
        params: Vec<(String, String)>,
        client_ip: Option<IpAddr>,
        chain: Arc<[Handler]>,
    ) -> Self {
        Self {
            parts,
            body,
            params,
            client_ip,
            chain,
            index: 0,
            response: ResponseState::default(),
        }
    }

    /// Run the chain from the start and produce the response
    pub(crate) fn run(mut self) -> Response {
        self.next();
        self.into_response()
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.response.body));
        *response.status_mut() = self.response.status;
        *response.headers_mut() = self.response.headers;
        response
    }
}

impl RequestContext for Context {
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn path(&self) -> &str {
        self.parts.uri.path()
    }

    fn param(&self, key: &str) -> String {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    fn query(&self, key: &str) -> String {
        let Some(query) = self.parts.uri.query() else {
            return String::new();
        };
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    fn header(&self, key: &str) -> String {
        self.parts
            .headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    fn client_ip(&self) -> String {
        self.client_ip.map(|ip| ip.to_string()).unwrap_or_default()
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn status(&self) -> StatusCode {
        self.response.status
    }

    fn set_header(&mut self, key: &str, value: &str) {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.response.headers.insert(name, value);
            }
            _ => tracing::warn!("Ignoring invalid response header {:?}", key),
        }
    }

    fn write(&mut self, status: StatusCode, content_type: &str, body: &[u8]) {
        if self.response.written {
            if status != self.response.status {
                tracing::warn!(
                    "Response already written with status {}, ignoring {}",
                    self.response.status,
                    status
                );
            }
        } else {
            self.response.status = status;
            self.response.written = true;
            if !content_type.is_empty()
                && !self.response.headers.contains_key(CONTENT_TYPE)
                && let Ok(value) = HeaderValue::from_str(content_type)
            {
                self.response.headers.insert(CONTENT_TYPE, value);
            }
        }
        self.response.body.extend_from_slice(body);
    }

    fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    fn next(&mut self) {
        while self.index < self.chain.len() {
            let handler = Arc::clone(&self.chain[self.index]);
            self.index += 1;
            let ctx: &mut dyn RequestContext = self;
            handler(ctx);
        }
    }
}
