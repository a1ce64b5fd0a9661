//! The concurrent session registry.
//!
//! [`SessionRegistry`] is the exclusive owner of sessions: it is the
//! only component that constructs them (with a collision-checked fresh
//! code) and the only one that deletes them (explicitly or via the age
//! sweep). Eviction removes the registry entry only; any task already
//! holding an `Arc<GameSession>` finishes its in-flight operation
//! safely.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use chutes_types::GameCode;
use rand::Rng;
use tracing::{debug, warn};

use crate::board::Board;
use crate::session::{GameSession, Player, SessionError, TurnPolicy};

/// Code alphabet without the ambiguous characters I, L, O, 0, 1.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of generated session codes.
const CODE_LEN: usize = 6;

/// Generate a fresh session code from the ambiguity-free alphabet.
fn generate_code() -> GameCode {
    let mut rng = rand::rng();
    let code = (0..CODE_LEN)
        .map(|_| {
            let i = rng.random_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET.get(i).copied().unwrap_or(b'A'))
        })
        .collect();
    GameCode::from_canonical(code)
}

/// Per-registry session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Board layout for new sessions.
    pub board: Board,
    /// Turn policy for new sessions.
    pub turn_policy: TurnPolicy,
    /// Roster capacity for new sessions.
    pub max_players: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            board: Board::default_board(),
            turn_policy: TurnPolicy::default(),
            max_players: crate::session::DEFAULT_MAX_PLAYERS,
        }
    }
}

/// Concurrent keyed collection of sessions.
pub struct SessionRegistry {
    settings: SessionSettings,
    sessions: RwLock<HashMap<GameCode, Arc<GameSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry that builds sessions with the given
    /// settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<GameCode, Arc<GameSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GameCode, Arc<GameSession>>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session with a fresh unique code and insert it.
    ///
    /// Code collisions are vanishingly rare (31^6 codes) but are
    /// retried regardless; the candidate is checked and inserted under
    /// one write lock so two racing creates can never share a code.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidName`] when the creator name is empty
    /// after trimming.
    pub fn create(&self, creator_name: &str) -> Result<(Arc<GameSession>, Player), SessionError> {
        loop {
            let code = generate_code();
            let mut sessions = self.write();
            if sessions.contains_key(&code) {
                warn!(%code, "session code collision, regenerating");
                continue;
            }
            let (session, creator) = GameSession::new(
                code.clone(),
                creator_name,
                self.settings.board.clone(),
                self.settings.turn_policy,
                self.settings.max_players,
            )?;
            let session = Arc::new(session);
            sessions.insert(code, Arc::clone(&session));
            return Ok((session, creator));
        }
    }

    /// Look up a session by code.
    pub fn get(&self, code: &GameCode) -> Option<Arc<GameSession>> {
        self.read().get(code).cloned()
    }

    /// Remove a session by code.
    pub fn remove(&self, code: &GameCode) {
        self.write().remove(code);
    }

    /// Number of sessions currently registered.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// A snapshot of all registered sessions.
    pub fn all(&self) -> Vec<Arc<GameSession>> {
        self.read().values().cloned().collect()
    }

    /// Remove every session created before `now - max_age`.
    ///
    /// Returns the number of sessions evicted. Status is irrelevant:
    /// finished and still-waiting sessions age out alike.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.created_at() >= cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "evicted aged-out sessions");
        }
        evicted
    }
}

impl core::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
