//! Serve mode CLI logic
//!
//! Contains the core logic for running the HTTP service from the command line.

use crate::{
    Adapter, Catalog, ConfigLoader, Locale, LoggingSettings, Registry, RequestContext,
    RequestContextExt, StartupError, TomlRegistry, handler, server::CONFIG_SECTION,
    utils::version,
};
use anyhow::{Context as _, Result};
use axum::http::StatusCode;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Arguments for serve mode
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub config: Option<String>,
    pub verbose: bool,
}

/// Body of `GET /ping`
#[derive(Debug, Serialize)]
struct PingResponse {
    status: &'static str,
    version: &'static str,
}

/// Run serve mode with the given arguments
pub async fn run_serve_mode(args: ServeArgs) -> Result<()> {
    // Configuration precedence:
    // 1. Command line arguments
    // 2. HTTPWRAPPER_* environment variables
    // 3. Configuration file (--config, HTTPWRAPPER_CONFIG or default location)
    // 4. Section defaults
    let config_path = match &args.config {
        Some(config) => Some(PathBuf::from(config)),
        None => ConfigLoader::get_config_path(),
    };

    let registry = ConfigLoader::new()
        .load(config_path.as_deref())
        .context("failed to load configuration")?;
    let registry = apply_cli_overrides(registry, &args);

    let logging = registry
        .parse::<LoggingSettings>("logging")
        .and_then(|logging| logging.validate().map(|()| logging))
        .unwrap_or_else(|e| {
            // Can't use tracing here since it's not initialized yet
            eprintln!("Warning: invalid logging configuration: {}. Using defaults.", e);
            LoggingSettings::default()
        });
    init_logging(&logging, args.verbose);

    tracing::info!("httpwrapper {}", version::get_detailed_version());

    let locale: Arc<dyn Locale> = Arc::new(
        Catalog::from_registry(&registry).context("failed to load messages")?,
    );
    let adapter = build_adapter(&registry, locale)?;
    adapter.start().await?;

    Ok(())
}

/// Construct and initialize the adapter with the built-in routes
pub fn build_adapter<R: Registry>(
    registry: &R,
    locale: Arc<dyn Locale>,
) -> std::result::Result<Adapter, StartupError> {
    let mut adapter = Adapter::new(registry, locale)?;
    adapter.initialize()?;
    adapter.get("/ping", [handler(ping)]);
    Ok(adapter)
}

fn ping(ctx: &mut dyn RequestContext) {
    let response = PingResponse {
        status: "ok",
        version: version::get_version(),
    };
    ctx.json(StatusCode::OK, &response);
}

fn apply_cli_overrides(mut registry: TomlRegistry, args: &ServeArgs) -> TomlRegistry {
    if let Some(host) = &args.host {
        registry = registry.with_value(CONFIG_SECTION, "host", host.as_str());
    }
    if let Some(port) = args.port {
        registry = registry.with_value(CONFIG_SECTION, "port", i64::from(port));
    }
    registry
}

/// Install the global subscriber.
///
/// Level precedence:
/// 1. `verbose` -> debug
/// 2. RUST_LOG
/// 3. `logging.level`
///
/// A subscriber installed earlier is kept.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&settings.level)
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if settings.is_json() {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
