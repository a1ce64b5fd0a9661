//! Axum router construction for the game server.
//!
//! Assembles both transports and the REST surface into a single
//! [`Router`] with CORS and request tracing middleware.

use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, handlers, poll, ws};

/// Build the complete Axum router.
///
/// - `GET /health` -- liveness probe
/// - `POST /games` -- create a session
/// - `GET /games/{code}` -- inspect a session
/// - `GET /ws` -- push transport (WebSocket upgrade)
/// - `POST /poll/connect`, `GET /poll/messages`, `POST /poll/send`,
///   `POST /poll/disconnect` -- pull transport
/// - `GET /admin/games`, `GET /admin/games/{code}` -- inspection
///   surface (basic auth)
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/games", post(handlers::create_game))
        .route("/games/{code}", get(handlers::get_game))
        .route("/ws", get(ws::ws_attach))
        .route("/poll/connect", post(poll::connect))
        .route("/poll/messages", get(poll::messages))
        .route("/poll/send", post(poll::send))
        .route("/poll/disconnect", post(poll::disconnect))
        .route("/admin/games", get(admin::list_games))
        .route("/admin/games/{code}", get(admin::game_detail))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy from the configured origin list. A single `*` entry
/// opens the server up entirely; an explicit list also enables
/// credentials.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(poll::CONNECTION_ID_HEADER),
        ])
        .allow_credentials(true)
}
