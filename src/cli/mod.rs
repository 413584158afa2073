//! Command-line entry points

pub mod server;

pub use server::{ServeArgs, build_adapter, init_logging, run_serve_mode};
