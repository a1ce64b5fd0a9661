//! REST handlers: session creation, session lookup, and health.
//!
//! Creation is deliberately REST-only: a client creates a session,
//! receives its code and the creator's player id, then attaches over
//! push or poll and rejoins with that id. Lookup lets a client inspect
//! a session before committing to join it.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chutes_types::GameCode;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /games`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Display name for the session's creator.
    pub creator_name: String,
}

/// `POST /games` — create a session with a fresh code.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateGameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, creator) = state.registry.create(&request.creator_name)?;
    let snapshot = session.snapshot();
    info!(game = %session.code(), creator = %creator.id, "game created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "game": snapshot.to_game_info(),
            "playerId": creator.id,
        })),
    ))
}

/// `GET /games/{code}` — inspect a session without joining it.
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let code = GameCode::normalize(&code);
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;
    let snapshot = session.snapshot();

    Ok(Json(json!({
        "game": snapshot.to_game_info(),
        "players": snapshot.to_player_infos(),
    })))
}

/// `GET /health` — liveness probe with basic occupancy counters.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "activeGames": state.registry.count(),
        "observers": state.hub.observer_count(),
        "pollConnections": state.polls.count(),
    }))
}
