//! The admin inspection surface.
//!
//! Read-only views over all live sessions, gated by a single shared
//! basic-auth credential from configuration. The detail view adds
//! derived standings (rank and distance to the final square) that the
//! player-facing protocol never carries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chutes_core::SessionSnapshot;
use chutes_types::{ErrorCode, GameCode};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::state::AppState;

/// Check the basic-auth header against the configured credential.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let unauthorized = || ApiError::new(ErrorCode::Unauthorized, "Unauthorized");

    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;
    let encoded = header.strip_prefix("Basic ").ok_or_else(unauthorized)?;
    let decoded = STANDARD.decode(encoded).map_err(|_| unauthorized())?;
    let credentials = String::from_utf8(decoded).map_err(|_| unauthorized())?;

    let (username, password) = credentials.split_once(':').ok_or_else(unauthorized)?;
    if username != state.config.admin.username || password != state.config.admin.password {
        return Err(unauthorized());
    }
    Ok(())
}

/// The player currently closest to the final square.
fn leader(snapshot: &SessionSnapshot) -> Option<&chutes_core::Player> {
    snapshot.players.iter().max_by_key(|p| p.position)
}

/// `GET /admin/games` — one-line summaries of every live session,
/// newest first.
pub async fn list_games(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;

    let mut snapshots: Vec<SessionSnapshot> = state
        .registry
        .all()
        .iter()
        .map(|session| session.snapshot())
        .collect();
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let games: Vec<Value> = snapshots
        .iter()
        .map(|snap| {
            let leader = leader(snap);
            json!({
                "code": snap.code,
                "status": snap.status,
                "playerCount": snap.players.len(),
                "createdAt": snap.created_at,
                "leaderName": leader.map(|p| p.name.clone()),
                "leaderPosition": leader.map(|p| p.position),
            })
        })
        .collect();

    Ok(Json(json!({ "games": games, "total": games.len() })))
}

/// `GET /admin/games/{code}` — full standings for one session, best
/// position first.
pub async fn game_detail(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;

    let code = GameCode::normalize(&code);
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;
    let snapshot = session.snapshot();

    let mut standings = snapshot.players.clone();
    standings.sort_by(|a, b| b.position.cmp(&a.position));

    let players: Vec<Value> = standings
        .iter()
        .enumerate()
        .map(|(i, player)| {
            json!({
                "id": player.id,
                "name": player.name,
                "color": player.color,
                "position": player.position,
                "isConnected": player.is_connected,
                "rank": i + 1,
                "distanceToWin": snapshot.board.size.saturating_sub(player.position),
            })
        })
        .collect();

    Ok(Json(json!({
        "game": snapshot.to_game_info(),
        "players": players,
        "observers": state.hub.game_observer_count(&code),
    })))
}
