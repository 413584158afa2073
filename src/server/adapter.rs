//! HTTP service adapter
//!
//! Owns the service configuration, the locale and the route table, and
//! assembles them into an axum application when it is time to serve.

use super::{
    context::{Context, Handler},
    group::RouteGroup,
    proxy::TrustedProxies,
    routes::{Mode, PathParam, Route, RouteTable, Verb, join_paths},
};
use crate::{
    Error,
    config::{Registry, ServiceConfig},
    error::{StartupError, fatal},
    locale::{HTTP_CONFIG_ERR, HTTP_INIT_ERR, HTTP_SERVE_ERR, HTTP_START, Locale},
};
use axum::{
    Router,
    extract::{ConnectInfo, RawPathParams, Request, rejection::RawPathParamsRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use http_body_util::LengthLimitError;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};

/// Registry section holding [`ServiceConfig`]
pub const CONFIG_SECTION: &str = "http";

/// Framework-agnostic HTTP service backed by axum
pub struct Adapter {
    config: ServiceConfig,
    locale: Arc<dyn Locale>,
    routes: RouteTable,
    proxies: TrustedProxies,
    initialized: bool,
    group: Option<String>,
}

impl Adapter {
    /// Parse the `[http]` section of `registry` and build an adapter.
    ///
    /// Parse or validation failures are fatal.
    pub fn new<R: Registry>(registry: &R, locale: Arc<dyn Locale>) -> Result<Self, StartupError> {
        let config = registry
            .parse::<ServiceConfig>(CONFIG_SECTION)
            .map_err(|e| fatal(locale.get(HTTP_CONFIG_ERR), e))?;
        Self::from_config(config, locale)
    }

    /// Build an adapter from an already parsed configuration
    pub fn from_config(config: ServiceConfig, locale: Arc<dyn Locale>) -> Result<Self, StartupError> {
        config
            .validate()
            .map_err(|e| fatal(locale.get(HTTP_CONFIG_ERR), e))?;

        let mode = if config.development {
            Mode::Debug
        } else {
            Mode::Release
        };
        debug!("HTTP engine in {:?} mode", mode);

        Ok(Self {
            config,
            locale,
            routes: RouteTable::new(mode),
            proxies: TrustedProxies::none(),
            initialized: false,
            group: None,
        })
    }

    /// Configure trusted proxies and install the logging and recovery layers.
    ///
    /// A rejected proxy entry is fatal.
    pub fn initialize(&mut self) -> Result<(), StartupError> {
        self.proxies = TrustedProxies::parse(&self.config.trusted_proxies)
            .map_err(|e| fatal(self.locale.get(HTTP_INIT_ERR), e))?;
        self.initialized = true;

        debug!(
            "Trusting {} proxy range(s), logging and recovery layers installed",
            self.proxies.len()
        );
        Ok(())
    }

    /// Bind `host:port` and serve until the process ends
    pub async fn start(self) -> Result<(), StartupError> {
        let address = self.config.address();
        info!("{} ({})", self.locale.get(HTTP_START), address);

        let listener = match TcpListener::bind(address.as_str()).await {
            Ok(listener) => listener,
            Err(e) => {
                let cause = Error::server(format!("cannot listen on {}: {}", address, e));
                return Err(fatal(self.locale.get(HTTP_SERVE_ERR), cause));
            }
        };
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), StartupError> {
        let locale = Arc::clone(&self.locale);
        debug!(
            "Shutdown timeout {:?} configured; connections are not drained on exit",
            self.config.shutdown_timeout
        );

        let app = self.into_router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| fatal(locale.get(HTTP_SERVE_ERR), e))
    }

    /// Engine mode selected from the `development` flag
    pub fn mode(&self) -> Mode {
        self.routes.mode()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Prefix of the current group, if one was created
    pub fn current_group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Registered routes in registration order
    pub fn routes(&self) -> &[Route] {
        self.routes.routes()
    }

    /// Add an engine-level handler that runs ahead of routes registered later
    pub fn use_middleware(&mut self, handler: Handler) {
        self.routes.use_middleware(handler);
    }

    /// Create a top-level group; it becomes the current group
    pub fn route_group(&mut self, prefix: &str) -> RouteGroup<'_> {
        let prefix = join_paths("/", prefix);
        self.group = Some(prefix.clone());
        RouteGroup::new(&mut self.routes, prefix)
    }

    /// Create a group under the current one; it becomes the current group
    pub fn nested_group(&mut self, prefix: &str) -> crate::Result<RouteGroup<'_>> {
        let Some(current) = self.group.as_deref() else {
            return Err(Error::NoActiveGroup {
                prefix: prefix.to_string(),
            });
        };

        let prefix = join_paths(current, prefix);
        self.group = Some(prefix.clone());
        Ok(RouteGroup::new(&mut self.routes, prefix))
    }

    pub fn get<I>(&mut self, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Get, path, handlers);
    }

    pub fn post<I>(&mut self, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Post, path, handlers);
    }

    pub fn put<I>(&mut self, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Put, path, handlers);
    }

    pub fn delete<I>(&mut self, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        self.handle(Verb::Delete, path, handlers);
    }

    /// Register on the current group when there is one, else at root
    pub fn handle<I>(&mut self, verb: Verb, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        let base = self.group.as_deref().unwrap_or("/");
        let full = join_paths(base, path);
        self.routes.add(verb, &full, handlers);
    }

    /// Assemble the axum application
    pub fn into_router(self) -> Router {
        let dispatcher = Arc::new(Dispatcher {
            proxies: self.proxies,
            max_body_size: self.config.max_body_size,
        });

        let mut by_pattern: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for route in self.routes.into_routes() {
            for pattern in route.patterns() {
                let method_router = by_pattern
                    .remove(pattern)
                    .unwrap_or_else(MethodRouter::new);

                let dispatcher = Arc::clone(&dispatcher);
                let names = Arc::clone(&route.params);
                let chain = Arc::clone(&route.chain);
                let handler = move |params: ParamsResult, request: Request| {
                    let dispatcher = Arc::clone(&dispatcher);
                    let names = Arc::clone(&names);
                    let chain = Arc::clone(&chain);
                    async move { dispatcher.dispatch(chain, &names, params, request).await }
                };

                by_pattern.insert(
                    pattern.to_string(),
                    method_router.on(route.verb.filter(), handler),
                );
            }
        }

        let router = by_pattern
            .into_iter()
            .fold(Router::new(), |router, (pattern, method_router)| {
                router.route(&pattern, method_router)
            });

        if self.initialized {
            router.layer(
                ServiceBuilder::new()
                    .layer(request_logging())
                    .layer(CatchPanicLayer::new()),
            )
        } else {
            router
        }
    }
}

/// Per-request span and completion record at INFO
fn request_logging() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

type ParamsResult = Result<RawPathParams, RawPathParamsRejection>;

struct Dispatcher {
    proxies: TrustedProxies,
    max_body_size: usize,
}

impl Dispatcher {
    async fn dispatch(
        &self,
        chain: Arc<[Handler]>,
        names: &[PathParam],
        params: ParamsResult,
        request: Request,
    ) -> Response {
        let params = named_params(names, params);

        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Rejecting request body: {}", e);
                return body_error_status(e).into_response();
            }
        };

        let client_ip = self.proxies.client_ip(remote, &parts.headers);
        Context::new(parts, body, params, client_ip, chain).run()
    }
}

/// Map positional axum parameters back to their registered names.
///
/// Catch-all values carry a leading `/`; on the bare prefix they are `/`.
fn named_params(names: &[PathParam], params: ParamsResult) -> Vec<(String, String)> {
    if names.is_empty() {
        return Vec::new();
    }

    let raw: Vec<(String, String)> = match params {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(e) => {
            debug!("Path parameters unavailable: {}", e);
            Vec::new()
        }
    };

    names
        .iter()
        .enumerate()
        .filter_map(|(position, param)| {
            let key = format!("p{}", position);
            let value = raw.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str());
            let value = match (param.catch_all, value) {
                (true, Some(rest)) => format!("/{}", rest),
                (true, None) => "/".to_string(),
                (false, Some(value)) => value.to_string(),
                (false, None) => return None,
            };
            Some((param.name.clone(), value))
        })
        .collect()
}

fn body_error_status(error: axum::Error) -> StatusCode {
    if error.into_inner().is::<LengthLimitError>() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TomlRegistry;
    use crate::locale::Catalog;
    use crate::server::context::{RequestContextExt, handler};
    use axum::body::Body;
    use serde_json::{Value, json};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn locale() -> Arc<dyn Locale> {
        Arc::new(Catalog::new())
    }

    fn adapter(toml: &str) -> Adapter {
        let registry = TomlRegistry::from_str(toml).unwrap();
        Adapter::new(&registry, locale()).unwrap()
    }

    async fn call(router: Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_release_mode_when_not_development() {
        let adapter = adapter("[http]\ndevelopment = false");
        assert_eq!(adapter.mode(), Mode::Release);
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn test_debug_mode_when_development() {
        let adapter = adapter("[http]\ndevelopment = true");
        assert_eq!(adapter.mode(), Mode::Debug);
    }

    #[test]
    fn test_unparseable_config_is_fatal() {
        let registry = TomlRegistry::from_str("[http]\nport = [1, 2]").unwrap();
        let err = Adapter::new(&registry, locale()).err().unwrap();

        assert_eq!(err.message(), "failed to parse http service configuration");
        assert!(matches!(err.cause(), Error::Config { .. }));
    }

    #[test]
    fn test_invalid_port_is_fatal() {
        let registry = TomlRegistry::from_str("[http]\nport = \"eighty\"").unwrap();
        assert!(Adapter::new(&registry, locale()).is_err());
    }

    #[test]
    fn test_rejected_proxy_is_fatal() {
        let mut adapter = adapter("[http]\ntrusted_proxies = [\"300.1.1.1\"]");
        let err = adapter.initialize().unwrap_err();

        assert_eq!(err.message(), "failed to initialize http service");
        assert!(matches!(err.cause(), Error::InvalidProxy { .. }));
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn test_routes_without_group_register_at_root() {
        let mut adapter = adapter("");
        adapter.get("/ping", [handler(|_| {})]);
        adapter.post("items", [handler(|_| {})]);

        let paths: Vec<&str> = adapter.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/ping", "/items"]);
        assert_eq!(adapter.current_group(), None);
    }

    #[test]
    fn test_route_group_becomes_current() {
        let mut adapter = adapter("");
        adapter.route_group("/api");
        adapter.get("/users", [handler(|_| {})]);
        adapter.put("/users/:id", [handler(|_| {})]);
        adapter.delete("/users/:id", [handler(|_| {})]);

        assert_eq!(adapter.current_group(), Some("/api"));
        let routes: Vec<(Verb, &str)> = adapter
            .routes()
            .iter()
            .map(|r| (r.verb, r.path.as_str()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (Verb::Get, "/api/users"),
                (Verb::Put, "/api/users/{id}"),
                (Verb::Delete, "/api/users/{id}"),
            ]
        );
    }

    #[test]
    fn test_nested_group_without_group_is_error() {
        let mut adapter = adapter("");
        let result = adapter.nested_group("/v1");

        match result {
            Err(Error::NoActiveGroup { prefix }) => assert_eq!(prefix, "/v1"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("nested group created without a parent"),
        }
        assert_eq!(adapter.current_group(), None);
    }

    #[test]
    fn test_nested_group_extends_current() {
        let mut adapter = adapter("");
        adapter.route_group("/api");
        adapter.nested_group("v1").unwrap().get("/status", [handler(|_| {})]);
        adapter.post("/jobs", [handler(|_| {})]);

        assert_eq!(adapter.current_group(), Some("/api/v1"));
        let paths: Vec<&str> = adapter.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/api/v1/status", "/api/v1/jobs"]);
    }

    #[tokio::test]
    async fn test_dispatch_reads_params_query_and_body() {
        let mut adapter = adapter("");
        adapter.route_group("/api");
        adapter.post(
            "/users/:id",
            [handler(|ctx| {
                let payload: Value = match ctx.bind_json() {
                    Ok(payload) => payload,
                    Err(_) => return,
                };
                let id = ctx.param("id");
                let verbose = ctx.query("verbose");
                ctx.json(
                    StatusCode::CREATED,
                    &json!({"id": id, "verbose": verbose, "name": payload["name"]}),
                );
            })],
        );

        let (status, body) = call(
            adapter.into_router(),
            "POST",
            "/api/users/7?verbose=yes",
            r#"{"name":"ana"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"id": "7", "verbose": "yes", "name": "ana"}));
    }

    #[tokio::test]
    async fn test_bind_json_malformed_returns_400() {
        let mut adapter = adapter("");
        adapter.post(
            "/echo",
            [handler(|ctx| {
                if let Ok(value) = ctx.bind_json::<Value>() {
                    ctx.json(StatusCode::OK, &value);
                }
            })],
        );

        let (status, body) = call(adapter.into_router(), "POST", "/echo", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_abort_with_status_json_skips_rest_of_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut adapter = adapter("");
        adapter.use_middleware(handler(|ctx| {
            if ctx.header("authorization").is_empty() {
                ctx.abort_with_status_json(StatusCode::UNAUTHORIZED, &json!({"error": "missing token"}));
            }
        }));
        adapter.get(
            "/secret",
            [handler(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.json(StatusCode::OK, &json!({"secret": 42}));
            })],
        );

        let (status, body) = call(adapter.into_router(), "GET", "/secret", "").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"missing token"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected() {
        let mut adapter = adapter("[http]\nmax_body_size = 8");
        adapter.post(
            "/upload",
            [handler(|ctx| {
                let size = ctx.body().len();
                ctx.json(StatusCode::OK, &size);
            })],
        );

        let (status, _) = call(adapter.into_router(), "POST", "/upload", "0123456789abcdef").await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_recovered() {
        let mut adapter = adapter("");
        adapter.initialize().unwrap();
        adapter.get("/boom", [handler(|_| panic!("handler failure"))]);

        let (status, _) = call(adapter.into_router(), "GET", "/boom", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_errors_are_classified() {
        use http_body_util::{BodyExt, Full, Limited};

        let limited = Limited::new(Full::new(axum::body::Bytes::from("0123456789")), 4)
            .collect()
            .await
            .err()
            .unwrap();
        assert_eq!(
            body_error_status(axum::Error::new(limited)),
            StatusCode::PAYLOAD_TOO_LARGE
        );

        let aborted = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away");
        assert_eq!(
            body_error_status(axum::Error::new(aborted)),
            StatusCode::BAD_REQUEST
        );
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requests_are_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut adapter = adapter("");
        adapter.initialize().unwrap();
        adapter.get("/logged", [handler(|ctx| ctx.json(StatusCode::OK, &"ok"))]);

        let (status, _) = call(adapter.into_router(), "GET", "/logged", "").await;
        assert_eq!(status, StatusCode::OK);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("finished processing request"), "{}", output);
        assert!(output.contains("/logged"), "{}", output);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let mut adapter = adapter("");
        adapter.get("/known", [handler(|_| {})]);

        let (status, _) = call(adapter.into_router(), "GET", "/unknown", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
