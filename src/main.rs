//! Exam Forge HTTP server.
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   UPLOAD_DIR          : book directory (default "./uploads")
//!   MAX_UPLOAD_BYTES    : request body cap (default 16 MiB)
//!   GEMINI_API_KEY      : required; the server refuses to start without it
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-1.5-flash-latest"
//!   GEMINI_TIMEOUT_SECS : per-call timeout (default 60)
//!   EXAMGEN_CONFIG_PATH : optional TOML with [prompts] and [tuning] overrides
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use exam_forge::config::ServerConfig;
use exam_forge::routes::build_router;
use exam_forge::state::AppState;
use exam_forge::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let server = ServerConfig::from_env()?;
  let state = match AppState::from_env(&server).await {
    Ok(s) => s,
    Err(e) => {
      error!(target: "exam_forge", error = %e, "Startup failed");
      return Err(e.into());
    }
  };

  let app = build_router(state, server.max_upload_bytes);

  let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "exam_forge", %addr, upload_dir = %server.upload_dir.display(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "exam_forge", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "exam_forge", "Shutdown signal received");
}
