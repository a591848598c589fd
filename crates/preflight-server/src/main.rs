//! Binary entrypoint for the preflight server.
//!
//! Reads configuration from environment variables:
//! - `PREFLIGHT_PORT`: listen port (default "8000")
//! - `PREFLIGHT_HISTORY_DIR`: history store directory (default ".preflight/history")
//! - `PREFLIGHT_WORKERS`: test worker pool size (default: CPU count)
//! - `PREFLIGHT_VALIDATOR_BASE_URL` / `_API_KEY` / `_MODEL`: validator endpoint

use preflight_server::config::Config;
use preflight_server::router::build_router;
use preflight_server::state::{AppState, ProjectBundle};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let bundle = ProjectBundle::standalone(&config);
    let state = AppState::new(&config, bundle).expect("failed to initialize application state");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("preflight server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
