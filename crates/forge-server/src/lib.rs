pub mod catapult;
pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/forge/version", get(routes::forge::version))
        .route("/forge/commands", get(routes::forge::list_commands))
        .route("/forge/commands/{name}", get(routes::forge::get_command))
        .route(
            "/forge/commands/{name}/validate",
            post(routes::forge::validate_command),
        )
        .route("/forge/commands/{name}/next", post(routes::forge::next_step))
        .route(
            "/forge/commands/{name}/query",
            get(routes::forge::query_command),
        )
        .route(
            "/forge/commands/{name}/execute",
            post(routes::forge::execute_command),
        )
        .route("/forge/commands/{name}/zip", post(routes::forge::zip_command))
        .route(
            "/forge/commands/{name}/catapult",
            post(routes::forge::catapult_command),
        )
        // Catapult status relay (WebSocket)
        .route("/status/{correlation_id}", get(routes::status::status_socket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the forge server.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener).await
}

/// Start the forge server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(config: ServerConfig, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(AppState::new(config));

    tracing::info!("forge server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
