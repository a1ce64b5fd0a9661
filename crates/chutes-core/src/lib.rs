//! Core game logic for the Chutes session server.
//!
//! This crate is transport-agnostic: it owns the board resolver, the
//! per-session state machine, the concurrent session registry, player
//! color assignment, and configuration loading. The hub and both
//! transport adapters build on these pieces without this crate knowing
//! they exist.
//!
//! # Concurrency model
//!
//! Each [`session::GameSession`] serializes its own mutations on an
//! internal mutex; the [`registry::SessionRegistry`] guards its map
//! independently. No code path here holds both locks at once, and no
//! lock is held across I/O.

pub mod board;
pub mod color;
pub mod config;
pub mod registry;
pub mod session;

pub use board::{Board, Link, MoveOutcome};
pub use config::{ChutesConfig, ConfigError};
pub use registry::{SessionRegistry, SessionSettings};
pub use session::{
    GameSession, Player, RollOutcome, SessionError, SessionSnapshot, TurnPolicy,
};
