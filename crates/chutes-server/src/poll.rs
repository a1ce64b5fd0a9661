//! The pull (HTTP poll) transport adapter.
//!
//! Poll clients have no persistent connection. They obtain a connection
//! id from `POST /poll/connect`, then alternate between
//! `POST /poll/send` (actions, answered synchronously) and
//! `GET /poll/messages` (a full current-state snapshot of the bound
//! session). A poll client may miss intermediate events, but every
//! poll observes the latest committed state; there is no event backlog
//! to replay.
//!
//! The [`PollRegistry`] is independent of the hub's observer set; a
//! background sweep disconnects entries whose `last_seen` timestamp has
//! gone stale, exactly as an explicit `POST /poll/disconnect` would.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use chutes_types::{ClientAction, ConnectionId, ErrorCode, GameCode, PlayerId, ServerEvent};
use serde_json::json;

use crate::actions::{self, Actor};
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the poll connection id.
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// One pull-transport connection.
#[derive(Debug, Clone)]
pub struct PollConnection {
    /// The connection id issued on connect.
    pub id: ConnectionId,
    /// Bound session, once the client has joined one.
    pub game: Option<GameCode>,
    /// Bound player, once the client has joined a session.
    pub player: Option<PlayerId>,
    /// Last time this client was heard from.
    pub last_seen: DateTime<Utc>,
    /// When the connection was created.
    pub created_at: DateTime<Utc>,
}

/// Registry of live poll connections, guarded independently of the
/// hub and the session registry.
#[derive(Default)]
pub struct PollRegistry {
    conns: RwLock<HashMap<ConnectionId, PollConnection>>,
}

impl PollRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, PollConnection>> {
        self.conns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, PollConnection>> {
        self.conns.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a fresh connection and return its id.
    pub fn add(&self) -> ConnectionId {
        let id = ConnectionId::new();
        let now = Utc::now();
        self.write().insert(
            id,
            PollConnection {
                id,
                game: None,
                player: None,
                last_seen: now,
                created_at: now,
            },
        );
        id
    }

    /// Refresh `last_seen`. Returns false for an unknown id.
    pub fn touch(&self, id: ConnectionId) -> bool {
        let mut conns = self.write();
        match conns.get_mut(&id) {
            Some(conn) => {
                conn.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Bind a connection to a session and player.
    pub fn bind(&self, id: ConnectionId, code: GameCode, player: PlayerId) {
        if let Some(conn) = self.write().get_mut(&id) {
            conn.game = Some(code);
            conn.player = Some(player);
        }
    }

    /// The session and player a connection is bound to, if any.
    pub fn binding(&self, id: ConnectionId) -> Option<(GameCode, PlayerId)> {
        let conns = self.read();
        let conn = conns.get(&id)?;
        Some((conn.game.clone()?, conn.player?))
    }

    /// A cloned view of one connection.
    pub fn get(&self, id: ConnectionId) -> Option<PollConnection> {
        self.read().get(&id).cloned()
    }

    /// Remove a connection, returning it for the disconnect path.
    pub fn remove(&self, id: ConnectionId) -> Option<PollConnection> {
        self.write().remove(&id)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Remove and return every connection idle longer than `staleness`.
    pub fn evict_stale(&self, staleness: Duration) -> Vec<PollConnection> {
        let cutoff = Utc::now() - staleness;
        let mut conns = self.write();
        let stale_ids: Vec<ConnectionId> = conns
            .values()
            .filter(|c| c.last_seen < cutoff)
            .map(|c| c.id)
            .collect();
        stale_ids
            .into_iter()
            .filter_map(|id| conns.remove(&id))
            .collect()
    }
}

/// Extract and validate the connection id header, refreshing
/// `last_seen` on success.
fn require_connection(state: &AppState, headers: &HeaderMap) -> Result<ConnectionId, ApiError> {
    let raw = headers
        .get(CONNECTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::InvalidMessage,
                "X-Connection-Id header is required",
            )
        })?;
    let id = raw
        .parse::<uuid::Uuid>()
        .map(ConnectionId::from)
        .map_err(|_| ApiError::new(ErrorCode::InvalidMessage, "Invalid connection id"))?;
    if !state.polls.touch(id) {
        return Err(ApiError::new(
            ErrorCode::InvalidMessage,
            "Connection not found",
        ));
    }
    Ok(id)
}

/// `POST /poll/connect` — create a poll connection.
pub async fn connect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let id = state.polls.add();
    Json(json!({ "connectionId": id }))
}

/// `GET /poll/messages` — full current-state snapshot of the bound
/// session, or an empty message list when unbound (or the session has
/// been evicted).
pub async fn messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let id = require_connection(&state, &headers)?;

    let Some((code, _)) = state.polls.binding(id) else {
        return Ok(Json(json!({ "messages": [] })));
    };
    let Some(session) = state.registry.get(&code) else {
        return Ok(Json(json!({ "messages": [] })));
    };

    let snapshot = session.snapshot();
    let event = ServerEvent::GameState {
        game: snapshot.to_game_info(),
        players: snapshot.to_player_infos(),
        current_turn_id: snapshot.current_turn,
    };
    Ok(Json(json!({ "messages": [event] })))
}

/// `POST /poll/send` — perform an action; the result is the response
/// body while push observers are notified through the hub.
pub async fn send(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ServerEvent>, ApiError> {
    let id = require_connection(&state, &headers)?;

    let action: ClientAction = serde_json::from_str(&body)
        .map_err(|_| ApiError::new(ErrorCode::InvalidMessage, "Invalid message format"))?;

    let actor = Actor::Pull(id);
    let reply = match action {
        ClientAction::JoinGame {
            game_code,
            player_name,
        } => actions::join_game(&state, actor, &game_code, &player_name)?,
        ClientAction::RejoinGame {
            game_code,
            player_id,
        } => actions::rejoin_game(&state, actor, &game_code, player_id)?,
        ClientAction::RollDice => actions::roll_dice(&state, actor)?,
        ClientAction::StartGame => actions::start_game(&state, actor)?,
        ClientAction::Ping => ServerEvent::Pong,
    };
    Ok(Json(reply))
}

/// `POST /poll/disconnect` — explicit disconnect: the bound player is
/// marked disconnected (never removed) and remaining observers are
/// notified.
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(raw) = headers
        .get(CONNECTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        && let Ok(uuid) = raw.parse::<uuid::Uuid>()
    {
        let id = ConnectionId::from(uuid);
        if let Some(conn) = state.polls.remove(id)
            && let (Some(code), Some(player)) = (conn.game, conn.player)
        {
            actions::disconnect_player(&state, &code, player, None);
        }
    }
    Json(json!({ "success": true }))
}
