//! Route table
//!
//! Registrations are collected here and only turned into an axum router when
//! the adapter is finalized, so settings applied after registration (trusted
//! proxies, body limit) still reach every route.

use super::context::Handler;
use std::fmt;
use std::sync::Arc;

use axum::routing::MethodFilter;

/// HTTP verbs the adapter registers handlers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    pub(crate) fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Engine verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Development: every registration is logged
    Debug,
    /// Production: registrations are silent
    #[default]
    Release,
}

/// A named path parameter, in position order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    /// Trailing `*name` segment
    pub catch_all: bool,
}

/// A registered route
#[derive(Clone)]
pub struct Route {
    pub verb: Verb,
    /// Path in axum syntax, with the names it was registered with
    pub path: String,
    /// Path handed to axum; parameters are named by position (`{p0}`, `{*p1}`)
    /// so routes of different verbs can share a shape
    pub pattern: String,
    /// Prefix a catch-all route also answers on, with the parameter set to `/`
    pub bare_pattern: Option<String>,
    pub params: Arc<[PathParam]>,
    pub chain: Arc<[Handler]>,
}

impl Route {
    /// Every axum path this route is mounted on
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.pattern.as_str()).chain(self.bare_pattern.as_deref())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("pattern", &self.pattern)
            .field("handlers", &self.chain.len())
            .finish()
    }
}

/// Ordered route registrations plus engine-level middleware
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    middleware: Vec<Handler>,
    mode: Mode,
}

impl RouteTable {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Append a handler that runs ahead of routes registered from now on
    pub fn use_middleware(&mut self, handler: Handler) {
        self.middleware.push(handler);
    }

    /// Register `handlers` for `verb` at the absolute `path`.
    ///
    /// # Panics
    ///
    /// Panics when the same verb is registered twice for a path shape, or
    /// when no handler is given. Both are programming errors caught at
    /// start-up. Parameter names do not distinguish shapes: `/users/:id` and
    /// `/users/:name` are the same path.
    pub fn add<I>(&mut self, verb: Verb, path: &str, handlers: I)
    where
        I: IntoIterator<Item = Handler>,
    {
        let path = to_axum_path(path);
        let chain: Vec<Handler> = self
            .middleware
            .iter()
            .cloned()
            .chain(handlers)
            .collect();

        if chain.len() == self.middleware.len() {
            panic!("no handler given for {} {}", verb, path);
        }
        let (pattern, params) = positional_pattern(&path);
        let bare_pattern = match params.last() {
            Some(param) if param.catch_all => pattern
                .rsplit_once('/')
                .map(|(prefix, _)| format!("{}/", prefix)),
            _ => None,
        };

        let taken = self
            .routes
            .iter()
            .filter(|r| r.verb == verb)
            .flat_map(|r| r.patterns())
            .any(|existing| existing == pattern || Some(existing) == bare_pattern.as_deref());
        if taken {
            panic!("handlers are already registered for {} {}", verb, path);
        }

        if self.mode == Mode::Debug {
            tracing::debug!("{:<6} {} ({} handlers)", verb, path, chain.len());
        }

        self.routes.push(Route {
            verb,
            path,
            pattern,
            bare_pattern,
            params: params.into(),
            chain: chain.into(),
        });
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn into_routes(self) -> Vec<Route> {
        self.routes
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// Join a relative path onto an absolute base.
///
/// The result is cleaned (`//`, `.` and `..` resolved) and keeps a trailing
/// slash when `relative` has one.
pub fn join_paths(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return clean_path(base);
    }

    let joined = clean_path(&format!("{}/{}", base, relative));
    if relative.ends_with('/') && !joined.ends_with('/') {
        format!("{}/", joined)
    } else {
        joined
    }
}

fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Translate `:name` and `*name` segments into axum's `{name}` and `{*name}`
pub fn to_axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Rename the parameters of an axum path by position
fn positional_pattern(path: &str) -> (String, Vec<PathParam>) {
    let mut params = Vec::new();
    let pattern = path
        .split('/')
        .map(|segment| {
            let Some(inner) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            else {
                return segment.to_string();
            };

            let position = params.len();
            match inner.strip_prefix('*') {
                Some(name) => {
                    params.push(PathParam {
                        name: name.to_string(),
                        catch_all: true,
                    });
                    format!("{{*p{}}}", position)
                }
                None => {
                    params.push(PathParam {
                        name: inner.to_string(),
                        catch_all: false,
                    });
                    format!("{{p{}}}", position)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    (pattern, params)
}
