//! Tracing setup.
//!
//! - LOG_LEVEL holds an EnvFilter directive string, e.g. "debug" or
//!   "info,generation=debug,library=info,tower_http=warn".
//! - LOG_FORMAT=json switches to structured JSON lines; anything else is the pretty format.
//!
//! Targets in use: `exam_forge` (startup, server), `generation` (pipeline and model calls),
//! `library` (book storage).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,generation=debug,exam_forge=debug,library=info,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two formats produce different subscriber types, so each branch installs its own.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
