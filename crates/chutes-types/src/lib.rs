//! Shared types for the Chutes game server.
//!
//! This leaf crate holds everything the core, hub, and server crates
//! agree on: strongly-typed identifiers, the session code newtype, the
//! wire protocol (client actions and server events), and the error code
//! taxonomy. It has no knowledge of transports or session internals.

pub mod ids;
pub mod messages;

pub use ids::{ConnectionId, GameCode, PlayerId};
pub use messages::{
    BoardInfo, ClientAction, ErrorCode, GameInfo, LinkInfo, LinkKind, MoveEffect, PlayerInfo,
    ServerEvent, SessionStatus,
};
