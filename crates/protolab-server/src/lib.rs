pub mod error;
pub mod guard;
pub mod launcher;
pub mod probe;
pub mod routes;
pub mod state;
pub mod terminator;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the lifecycle routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/prototypes", get(routes::prototypes::list_prototypes))
        .route(
            "/prototypes/{port}/start",
            post(routes::prototypes::start_prototype),
        )
        .route(
            "/prototypes/{port}/stop",
            post(routes::prototypes::stop_prototype),
        )
        .route(
            "/prototypes/{port}/status",
            get(routes::prototypes::prototype_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind the controller's listener on `host:port`. `host` is the configured
/// `server.host` (loopback unless the user opts in), IPv6 with or without
/// brackets.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    Ok(listener)
}

/// Start the lifecycle controller on a pre-bound listener.
///
/// The caller binds (see [`bind`]) so it can read the actual port before
/// starting, which matters when `port = 0` and the OS picks a free one.
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(AppState::load(root)?);

    tracing::info!(addr = %listener.local_addr()?, "protolab controller listening");

    axum::serve(listener, app).await?;
    Ok(())
}
