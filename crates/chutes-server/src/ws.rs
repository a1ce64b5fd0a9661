//! The push (WebSocket) transport adapter.
//!
//! Each socket is one hub observer, driven by a single task: a
//! `select!` loop that drains the observer's outbound frame queue into
//! the socket, reads client frames, and runs the keepalive timer. One
//! task per socket means frames for a connection are sent in order and
//! no locking is needed around the socket itself.
//!
//! Liveness follows the classic ping/pong scheme: the server pings on
//! an interval and closes the connection when no frame of any kind has
//! arrived within the liveness deadline. Teardown marks the bound
//! player disconnected (never removed) and notifies the remaining
//! observers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chutes_types::{ClientAction, ErrorCode, ServerEvent};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::actions::{self, Actor};
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and attach it
/// to the hub as an observer.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_attach(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (observer, mut rx) = chutes_hub::Observer::new();
    let id = observer.id;
    state.hub.attach(observer);
    debug!(observer = %id, "push client connected");

    let ping_period = state.config.ws.ping_interval();
    let liveness = state.config.ws.liveness_deadline();
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Drain the hub's outbound queue into the socket.
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    // Hub side gone; nothing more will arrive.
                    break;
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    debug!(observer = %id, "push client disconnected (send failed)");
                    break;
                }
            }
            // Client frames: actions, liveness, close.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        handle_frame(&state, id, text.as_str());
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(observer = %id, "push client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(observer = %id, "push socket error: {e}");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // Binary frames are not part of the protocol.
                        last_seen = Instant::now();
                    }
                }
            }
            // Keepalive: ping on the interval, drop dead connections.
            _ = ping.tick() => {
                if last_seen.elapsed() > liveness {
                    warn!(observer = %id, "push client timed out");
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    debug!(observer = %id, "push client disconnected (ping failed)");
                    break;
                }
            }
        }
    }

    if let Some((code, player)) = state.hub.binding(id) {
        actions::disconnect_player(&state, &code, player, Some(id));
    }
    state.hub.detach(id);
}

/// Parse and dispatch one client frame.
///
/// Join and rejoin replies go back as direct frames; roll and start
/// results reach the actor through its own hub queue like everyone
/// else's, so their return values are dropped here. Failures become
/// direct error frames and never touch the broadcast path.
fn handle_frame(state: &Arc<AppState>, id: chutes_types::ConnectionId, raw: &str) {
    let action: ClientAction = match serde_json::from_str(raw) {
        Ok(action) => action,
        Err(_) => {
            state.hub.send_direct(
                id,
                &ServerEvent::error(ErrorCode::InvalidMessage, "Invalid message format"),
            );
            return;
        }
    };

    let actor = Actor::Push(id);
    let result = match action {
        ClientAction::JoinGame {
            game_code,
            player_name,
        } => actions::join_game(state, actor, &game_code, &player_name).map(Some),
        ClientAction::RejoinGame {
            game_code,
            player_id,
        } => actions::rejoin_game(state, actor, &game_code, player_id).map(Some),
        ClientAction::RollDice => actions::roll_dice(state, actor).map(|_| None),
        ClientAction::StartGame => actions::start_game(state, actor).map(|_| None),
        ClientAction::Ping => Ok(Some(ServerEvent::Pong)),
    };

    match result {
        Ok(Some(reply)) => state.hub.send_direct(id, &reply),
        Ok(None) => {}
        Err(err) => state.hub.send_direct(id, &err.to_event()),
    }
}
