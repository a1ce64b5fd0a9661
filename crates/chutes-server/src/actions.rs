//! Transport-neutral action dispatch.
//!
//! Both adapters funnel [`ClientAction`] requests here. Each function
//! performs the whole mutation through the session core, takes a
//! snapshot, and fans the resulting events out through the hub; the
//! returned [`ServerEvent`] is the actor's direct reply (the poll
//! response body, or the frame the push loop sends back on its own
//! socket). The adapters themselves stay thin: parsing and connection
//! lifecycle only.

use chutes_core::{RollOutcome, SessionSnapshot};
use chutes_types::{
    ConnectionId, ErrorCode, GameCode, MoveEffect, PlayerId, ServerEvent,
};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Which transport an action arrived on, with its connection id.
///
/// The distinction matters only for binding (hub group vs. poll
/// registry) and for excluding the actor from broadcasts it already
/// receives as a direct reply.
#[derive(Debug, Clone, Copy)]
pub enum Actor {
    /// A push (WebSocket) observer attached to the hub.
    Push(ConnectionId),
    /// A pull (HTTP poll) connection.
    Pull(ConnectionId),
}

impl Actor {
    fn bind(self, state: &AppState, code: GameCode, player: PlayerId) {
        match self {
            Self::Push(id) => state.hub.bind(id, code, player),
            Self::Pull(id) => state.polls.bind(id, code, player),
        }
    }

    fn binding(self, state: &AppState) -> Option<(GameCode, PlayerId)> {
        match self {
            Self::Push(id) => state.hub.binding(id),
            Self::Pull(id) => state.polls.binding(id),
        }
    }

    /// Broadcast to the session, excluding the actor when it is a push
    /// observer (it gets the direct reply instead).
    fn broadcast(self, state: &AppState, code: &GameCode, event: &ServerEvent) {
        match self {
            Self::Push(id) => state.hub.publish_except(code, id, event),
            Self::Pull(_) => state.hub.publish(code, event),
        }
    }
}

fn joined_reply(snapshot: &SessionSnapshot, player_id: PlayerId) -> ServerEvent {
    ServerEvent::JoinedGame {
        player_id,
        game: snapshot.to_game_info(),
        players: snapshot.to_player_infos(),
    }
}

/// Join an existing session as a new player and bind the connection.
pub fn join_game(
    state: &AppState,
    actor: Actor,
    raw_code: &str,
    player_name: &str,
) -> Result<ServerEvent, ApiError> {
    let code = GameCode::normalize(raw_code);
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;

    let player = session.join(player_name)?;
    let snapshot = session.snapshot();

    actor.bind(state, code.clone(), player.id);
    info!(game = %code, player = %player.id, name = %player.name, "player joined");

    actor.broadcast(
        state,
        &code,
        &ServerEvent::PlayerJoined {
            player: player.to_info(&code),
        },
    );
    Ok(joined_reply(&snapshot, player.id))
}

/// Reattach to a session as an existing player after a disconnect.
pub fn rejoin_game(
    state: &AppState,
    actor: Actor,
    raw_code: &str,
    player_id: PlayerId,
) -> Result<ServerEvent, ApiError> {
    let code = GameCode::normalize(raw_code);
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;

    session.set_connected(player_id, true)?;
    let snapshot = session.snapshot();
    let player = snapshot
        .player(player_id)
        .ok_or_else(|| ApiError::new(ErrorCode::PlayerNotFound, "Player not found"))?;

    actor.bind(state, code.clone(), player_id);
    info!(game = %code, player = %player_id, "player reconnected");

    actor.broadcast(
        state,
        &code,
        &ServerEvent::PlayerJoined {
            player: player.to_info(&code),
        },
    );
    Ok(joined_reply(&snapshot, player_id))
}

/// Roll the dice for the player this connection is bound to.
pub fn roll_dice(state: &AppState, actor: Actor) -> Result<ServerEvent, ApiError> {
    let (code, player_id) = actor
        .binding(state)
        .ok_or_else(|| ApiError::new(ErrorCode::GameNotFound, "Not in a game"))?;
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;

    let outcome = session.roll(player_id)?;
    let snapshot = session.snapshot();
    let player_name = snapshot
        .player(player_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    let moved = moved_event(player_id, player_name.clone(), &outcome);
    // The roll broadcast goes to everyone, actor included: push clients
    // learn their own move the same way spectators do. The poll actor
    // additionally gets it as the response body.
    state.hub.publish(&code, &moved);

    if outcome.won {
        info!(game = %code, winner = %player_id, "game won");
        state.hub.publish(
            &code,
            &ServerEvent::GameEnded {
                winner_id: player_id,
                winner_name: player_name,
            },
        );
    }
    Ok(moved)
}

/// Start the session. Creator only; first turn goes to the creator.
pub fn start_game(state: &AppState, actor: Actor) -> Result<ServerEvent, ApiError> {
    let (code, player_id) = actor
        .binding(state)
        .ok_or_else(|| ApiError::new(ErrorCode::GameNotFound, "Not in a game"))?;
    let session = state.registry.get(&code).ok_or_else(ApiError::game_not_found)?;

    let first_player_id = session.start(player_id)?;
    let snapshot = session.snapshot();
    info!(game = %code, "game started");

    let started = ServerEvent::GameStarted {
        game: snapshot.to_game_info(),
        first_player_id,
    };
    state.hub.publish(&code, &started);
    Ok(started)
}

/// Mark a player disconnected and notify the remaining observers.
///
/// `except` excludes the departing push observer from the broadcast;
/// poll disconnects pass `None` since the poll connection is already
/// gone from its registry.
pub fn disconnect_player(
    state: &AppState,
    code: &GameCode,
    player_id: PlayerId,
    except: Option<ConnectionId>,
) {
    let Some(session) = state.registry.get(code) else {
        return;
    };
    // A missing player means the session was rebuilt meanwhile; there
    // is no one to mark and nothing to announce about them.
    if session.set_connected(player_id, false).is_err() {
        return;
    }
    let player_name = session
        .player(player_id)
        .map(|p| p.name)
        .unwrap_or_default();
    info!(game = %code, player = %player_id, "player disconnected");

    let left = ServerEvent::PlayerLeft {
        player_id,
        player_name,
    };
    match except {
        Some(id) => state.hub.publish_except(code, id, &left),
        None => state.hub.publish(code, &left),
    }
}

fn moved_event(player_id: PlayerId, player_name: String, outcome: &RollOutcome) -> ServerEvent {
    ServerEvent::PlayerMoved {
        player_id,
        player_name,
        dice_roll: outcome.roll,
        previous_position: outcome.previous_position,
        new_position: outcome.new_position,
        effect: outcome.link.map(|link| MoveEffect {
            kind: link.kind,
            from: link.start,
            to: link.end,
        }),
        next_player_id: outcome.next_player,
    }
}
