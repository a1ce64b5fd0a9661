//! Wire protocol shared by both transports.
//!
//! Client requests are [`ClientAction`] values tagged by an `action`
//! field; server pushes are [`ServerEvent`] values tagged by `type`.
//! Both adapters speak exactly this vocabulary: the push socket carries
//! the JSON frames directly, the poll adapter wraps them in its
//! request/response bodies.
//!
//! The projection structs ([`GameInfo`], [`PlayerInfo`], [`BoardInfo`])
//! are point-in-time copies of session state. They never borrow from
//! live session internals, so serializing one can never observe a
//! half-applied mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GameCode, PlayerId};

/// Lifecycle status of a game session.
///
/// Transitions are monotonic: `Waiting` → `Active` → `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, accepting joins, not yet started.
    Waiting,
    /// Started; players are racing.
    Active,
    /// A player reached the final square.
    Finished,
}

/// The kind of short-circuit link on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Jumps the player forward (a ladder).
    Advance,
    /// Drops the player backward (a snake).
    Setback,
}

/// A request sent by a client over either transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientAction {
    /// Join an existing session as a new player.
    JoinGame {
        /// The session code to join.
        game_code: String,
        /// The display name for the new player.
        player_name: String,
    },
    /// Reattach to a session as an existing player after a disconnect.
    RejoinGame {
        /// The session code to rejoin.
        game_code: String,
        /// The player identity issued on the original join.
        player_id: PlayerId,
    },
    /// Roll the dice. Session and player come from the adapter-held
    /// binding established by a prior join or rejoin.
    RollDice,
    /// Start the session. Only the creator may do this.
    StartGame,
    /// Liveness probe; answered with [`ServerEvent::Pong`].
    Ping,
}

/// An event pushed (or returned) by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent to the actor after a successful join or rejoin.
    JoinedGame {
        /// The identity the actor should present from now on.
        player_id: PlayerId,
        /// The session the actor is now bound to.
        game: GameInfo,
        /// The full roster at join time.
        players: Vec<PlayerInfo>,
    },
    /// Broadcast when a new player joins or a player reconnects.
    PlayerJoined {
        /// The joining player.
        player: PlayerInfo,
    },
    /// Broadcast when a player disconnects. The player stays on the
    /// roster with its connected flag cleared.
    PlayerLeft {
        /// The disconnected player.
        player_id: PlayerId,
        /// Display name, for clients that only track the roster loosely.
        player_name: String,
    },
    /// Broadcast after a successful roll.
    PlayerMoved {
        /// The player that rolled.
        player_id: PlayerId,
        /// Display name of that player.
        player_name: String,
        /// The dice value, 1 through 6.
        dice_roll: u8,
        /// Track position before the move.
        previous_position: u16,
        /// Track position after the move (and any link).
        new_position: u16,
        /// The link traversed, when the move landed on one.
        effect: Option<MoveEffect>,
        /// Under rotation policy, the player whose turn is next.
        #[serde(skip_serializing_if = "Option::is_none")]
        next_player_id: Option<PlayerId>,
    },
    /// Broadcast when the creator starts the session.
    GameStarted {
        /// The session at start time.
        game: GameInfo,
        /// The player whose turn is first.
        first_player_id: PlayerId,
    },
    /// Broadcast when a player wins.
    GameEnded {
        /// The winner.
        winner_id: PlayerId,
        /// Display name of the winner.
        winner_name: String,
    },
    /// Full current-state snapshot; the poll adapter's reconciliation
    /// payload.
    GameState {
        /// The bound session.
        game: GameInfo,
        /// The full roster.
        players: Vec<PlayerInfo>,
        /// Under rotation policy, the player whose turn it is.
        #[serde(skip_serializing_if = "Option::is_none")]
        current_turn_id: Option<PlayerId>,
    },
    /// A request failed. Delivered only to the actor.
    Error {
        /// Machine-readable failure code.
        code: ErrorCode,
        /// Human-readable description. Never carries internal detail.
        message: String,
    },
    /// Answer to [`ClientAction::Ping`].
    Pong,
}

impl ServerEvent {
    /// Build an error event.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

/// A link traversal that happened during a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEffect {
    /// Advance or setback.
    pub kind: LinkKind,
    /// The square the player landed on (the link's start).
    pub from: u16,
    /// The square the link carried the player to.
    pub to: u16,
}

/// Point-in-time projection of a session for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    /// The session code.
    pub code: GameCode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// The player that created the session.
    pub creator_id: PlayerId,
    /// The winner, once the session is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    /// Board layout.
    pub board: BoardInfo,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Board layout projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    /// Number of squares on the linear track.
    pub size: u16,
    /// The short-circuit links.
    pub links: Vec<LinkInfo>,
}

/// A single board link projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    /// The square that triggers the link.
    pub start: u16,
    /// The square the link leads to.
    pub end: u16,
    /// Advance or setback.
    pub kind: LinkKind,
}

/// Point-in-time projection of a player for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// The player identity.
    pub id: PlayerId,
    /// The session the player belongs to.
    pub game_code: GameCode,
    /// Display name.
    pub name: String,
    /// Assigned color, `#RRGGBB`.
    pub color: String,
    /// Current track position; 0 is the start square.
    pub position: u16,
    /// Whether an observer is currently attached for this player.
    pub is_connected: bool,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
}

/// Machine-readable failure codes shared by both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No session exists for the given code.
    GameNotFound,
    /// The session is at its player capacity.
    GameFull,
    /// The session already left the waiting state.
    GameAlreadyStarted,
    /// The session has not been started yet.
    GameNotStarted,
    /// Only the creator may start a session.
    NotGameCreator,
    /// The player id is unknown to the session.
    PlayerNotFound,
    /// The request payload was malformed or invalid.
    InvalidMessage,
    /// An unexpected internal failure.
    InternalError,
    /// Under rotation policy, a roll arrived out of turn.
    NotYourTurn,
    /// Missing or wrong admin credentials.
    Unauthorized,
}

impl ErrorCode {
    /// The wire string for this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::GameFull => "GAME_FULL",
            Self::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Self::GameNotStarted => "GAME_NOT_STARTED",
            Self::NotGameCreator => "NOT_GAME_CREATOR",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
