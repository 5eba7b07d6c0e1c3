#![forbid(unsafe_code)]

//! # Plexus Telemetry
//!
//! Tracing subscriber setup shared by binaries and tests. Log verbosity
//! follows `RUST_LOG`, falling back to `info` for the plexus targets.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber; panics if one is already set.
/// Binaries call this once at startup.
pub fn init() {
    try_init().expect("tracing subscriber already installed");
}

/// Installs the global tracing subscriber, reporting failure instead of
/// panicking. Tests call this per-binary and ignore the duplicate-install
/// error.
pub fn try_init() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,task=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| e.to_string())
}
