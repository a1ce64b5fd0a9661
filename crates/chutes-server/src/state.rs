//! Shared application state for the game server.
//!
//! [`AppState`] owns the three independently guarded collections: the
//! session registry, the hub's observer groups, and the
//! poll-connection registry, plus the loaded configuration.
//! It is wrapped in [`Arc`] and injected into handlers via Axum's
//! `State` extractor; nothing here is a process-wide global.

use std::sync::Arc;
use std::time::Instant;

use chutes_core::{ChutesConfig, SessionRegistry, SessionSettings};
use chutes_hub::GameHub;

use crate::poll::PollRegistry;

/// Shared state for the Axum application.
pub struct AppState {
    /// Loaded configuration.
    pub config: ChutesConfig,
    /// The concurrent session registry.
    pub registry: SessionRegistry,
    /// Observer tracking and event fan-out.
    pub hub: GameHub,
    /// Pull-transport connection registry.
    pub polls: PollRegistry,
    /// Process start time, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Build the application state from configuration.
    pub fn new(config: ChutesConfig) -> Arc<Self> {
        let settings = SessionSettings {
            board: chutes_core::Board::default_board(),
            turn_policy: config.game.turn_policy,
            max_players: config.game.max_players,
        };
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(settings),
            hub: GameHub::new(),
            polls: PollRegistry::new(),
            started_at: Instant::now(),
        })
    }
}
