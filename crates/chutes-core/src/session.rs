//! The session state machine.
//!
//! A [`GameSession`] owns one game's mutable state behind a mutex.
//! Every public operation acquires the lock, performs the whole
//! mutation, and releases it before returning, so concurrent callers
//! are linearized and no half-updated state is ever observable. The
//! critical sections are short, synchronous, and never perform I/O.
//!
//! Fan-out to observers is not this module's job: callers take a
//! [`SessionSnapshot`] after the mutation returns and build events from
//! that, so event delivery never runs under the session lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use chutes_types::{
    ErrorCode, GameCode, GameInfo, PlayerId, PlayerInfo, SessionStatus,
};
use rand::Rng;
use serde::Deserialize;

use crate::board::{Board, Link};
use crate::color::color_for_index;

/// Default player capacity per session.
pub const DEFAULT_MAX_PLAYERS: usize = 8;

/// Who may roll while a session is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPolicy {
    /// A race: any player on the roster may roll at any time; there is
    /// no turn rotation.
    #[default]
    FreeForAll,
    /// Strict rotation: only the current-turn player may roll, and the
    /// turn advances after each successful roll.
    Rotation,
}

/// A player on a session's roster.
#[derive(Debug, Clone)]
pub struct Player {
    /// The player identity.
    pub id: PlayerId,
    /// Trimmed display name.
    pub name: String,
    /// Assigned `#RRGGBB` color.
    pub color: String,
    /// Current track position; 0 is the start square.
    pub position: u16,
    /// Whether an observer is currently attached for this player.
    pub is_connected: bool,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl Player {
    fn new(name: String, index: usize) -> Self {
        Self {
            id: PlayerId::new(),
            name,
            color: color_for_index(index),
            position: 0,
            is_connected: true,
            joined_at: Utc::now(),
        }
    }

    /// Project this player into its wire form.
    pub fn to_info(&self, code: &GameCode) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            game_code: code.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            position: self.position,
            is_connected: self.is_connected,
            joined_at: self.joined_at,
        }
    }
}

/// Result of a successful [`GameSession::roll`].
#[derive(Debug, Clone)]
pub struct RollOutcome {
    /// The dice value, 1 through 6.
    pub roll: u8,
    /// Position before the move.
    pub previous_position: u16,
    /// Position after the move and any link.
    pub new_position: u16,
    /// The link traversed, if any.
    pub link: Option<Link>,
    /// Whether this roll won the game.
    pub won: bool,
    /// Under rotation policy, the player whose turn is next.
    pub next_player: Option<PlayerId>,
}

/// Failure modes of session operations.
///
/// Every operation is all-or-nothing: when one of these is returned,
/// no session state has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The supplied player name was empty after trimming.
    #[error("player name is required")]
    InvalidName,

    /// The roster is at capacity.
    #[error("game is full")]
    GameFull,

    /// The session has already left the waiting state.
    #[error("game has already started")]
    AlreadyStarted,

    /// The session has not been started yet (or already finished).
    #[error("game has not started")]
    NotStarted,

    /// Only the creator may start a session.
    #[error("only the game creator can start the game")]
    NotCreator,

    /// The player id is unknown to this session.
    #[error("player not found")]
    PlayerNotFound,

    /// Under rotation policy, the roll arrived out of turn.
    #[error("it is not this player's turn")]
    NotYourTurn,
}

impl SessionError {
    /// The wire error code for this failure.
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::InvalidName => ErrorCode::InvalidMessage,
            Self::GameFull => ErrorCode::GameFull,
            Self::AlreadyStarted => ErrorCode::GameAlreadyStarted,
            Self::NotStarted => ErrorCode::GameNotStarted,
            Self::NotCreator => ErrorCode::NotGameCreator,
            Self::PlayerNotFound => ErrorCode::PlayerNotFound,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
        }
    }
}

/// Consistent point-in-time copy of a session's externally visible
/// state. Holds no references into the live session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The session code.
    pub code: GameCode,
    /// Lifecycle status at snapshot time.
    pub status: SessionStatus,
    /// The creator's player id.
    pub creator_id: PlayerId,
    /// The winner, once finished.
    pub winner_id: Option<PlayerId>,
    /// The board layout.
    pub board: Board,
    /// The roster in join order.
    pub players: Vec<Player>,
    /// Under rotation policy, the current-turn player while active.
    pub current_turn: Option<PlayerId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Project into the wire [`GameInfo`].
    pub fn to_game_info(&self) -> GameInfo {
        GameInfo {
            code: self.code.clone(),
            status: self.status,
            creator_id: self.creator_id,
            winner_id: self.winner_id,
            board: self.board.to_info(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Project the roster into wire [`PlayerInfo`] values.
    pub fn to_player_infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(|p| p.to_info(&self.code)).collect()
    }

    /// Find a player on the snapshot's roster.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

struct SessionInner {
    status: SessionStatus,
    players: Vec<Player>,
    current_turn: usize,
    winner_id: Option<PlayerId>,
    updated_at: DateTime<Utc>,
}

/// One game instance. All mutation goes through `&self` methods that
/// serialize against each other on an internal mutex.
pub struct GameSession {
    code: GameCode,
    creator_id: PlayerId,
    board: Board,
    turn_policy: TurnPolicy,
    max_players: usize,
    created_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

impl GameSession {
    /// Create a session in the waiting state with the creator as its
    /// first player.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidName`] when the creator name is empty
    /// after trimming.
    pub fn new(
        code: GameCode,
        creator_name: &str,
        board: Board,
        turn_policy: TurnPolicy,
        max_players: usize,
    ) -> Result<(Self, Player), SessionError> {
        let name = creator_name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidName);
        }

        let creator = Player::new(name.to_string(), 0);
        let now = Utc::now();
        let session = Self {
            code,
            creator_id: creator.id,
            board,
            turn_policy,
            max_players,
            created_at: now,
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Waiting,
                players: vec![creator.clone()],
                current_turn: 0,
                winner_id: None,
                updated_at: now,
            }),
        };
        Ok((session, creator))
    }

    /// The session code.
    pub fn code(&self) -> &GameCode {
        &self.code
    }

    /// The creator's player id.
    pub fn creator_id(&self) -> PlayerId {
        self.creator_id
    }

    /// Creation timestamp; the eviction sweep keys off this.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    // A poisoned mutex means a panic inside a critical section; the
    // state itself is still all-or-nothing per operation, so continuing
    // with the inner value is sound.
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new player to the roster.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidName`] for an empty trimmed name,
    /// [`SessionError::AlreadyStarted`] when the session has left the
    /// waiting state, [`SessionError::GameFull`] at capacity.
    pub fn join(&self, name: &str) -> Result<Player, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidName);
        }

        let mut inner = self.lock();

        if inner.status != SessionStatus::Waiting {
            return Err(SessionError::AlreadyStarted);
        }
        if inner.players.len() >= self.max_players {
            return Err(SessionError::GameFull);
        }

        let player = Player::new(name.to_string(), inner.players.len());
        inner.players.push(player.clone());
        inner.updated_at = Utc::now();
        Ok(player)
    }

    /// Transition from waiting to active. Creator only.
    ///
    /// Returns the id of the player whose turn is first.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyStarted`] when not waiting,
    /// [`SessionError::NotCreator`] for any other requester.
    pub fn start(&self, player_id: PlayerId) -> Result<PlayerId, SessionError> {
        let mut inner = self.lock();

        if inner.status != SessionStatus::Waiting {
            return Err(SessionError::AlreadyStarted);
        }
        if self.creator_id != player_id {
            return Err(SessionError::NotCreator);
        }

        inner.status = SessionStatus::Active;
        inner.current_turn = 0;
        inner.updated_at = Utc::now();

        inner
            .players
            .first()
            .map(|p| p.id)
            .ok_or(SessionError::PlayerNotFound)
    }

    /// Roll the dice for a player and apply the move.
    ///
    /// The dice value comes from a thread-local CSPRNG. On a winning
    /// move the session transitions to finished and the winner is
    /// recorded; under rotation policy a non-winning roll advances the
    /// turn pointer.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotStarted`] unless the session is active,
    /// [`SessionError::PlayerNotFound`] for an unknown id, and
    /// [`SessionError::NotYourTurn`] under rotation policy when the
    /// roller is not the current-turn player.
    pub fn roll(&self, player_id: PlayerId) -> Result<RollOutcome, SessionError> {
        let mut inner = self.lock();

        if inner.status != SessionStatus::Active {
            return Err(SessionError::NotStarted);
        }

        let index = inner
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(SessionError::PlayerNotFound)?;

        // The single pluggable turn check. FreeForAll is a race:
        // everyone rolls whenever they like.
        if self.turn_policy == TurnPolicy::Rotation
            && inner.players.get(inner.current_turn).map(|p| p.id) != Some(player_id)
        {
            return Err(SessionError::NotYourTurn);
        }

        let roll = rand::rng().random_range(1..=6);
        let previous_position = inner
            .players
            .get(index)
            .map(|p| p.position)
            .ok_or(SessionError::PlayerNotFound)?;
        let outcome = self.board.resolve(previous_position, roll);

        if let Some(player) = inner.players.get_mut(index) {
            player.position = outcome.new_position;
        }

        let mut next_player = None;
        if outcome.won {
            inner.status = SessionStatus::Finished;
            inner.winner_id = Some(player_id);
        } else if self.turn_policy == TurnPolicy::Rotation {
            inner.current_turn = (inner.current_turn + 1) % inner.players.len();
            next_player = inner.players.get(inner.current_turn).map(|p| p.id);
        }

        inner.updated_at = Utc::now();

        Ok(RollOutcome {
            roll,
            previous_position,
            new_position: outcome.new_position,
            link: outcome.link,
            won: outcome.won,
            next_player,
        })
    }

    /// Flip a player's connectivity flag. Never removes the player.
    ///
    /// # Errors
    ///
    /// [`SessionError::PlayerNotFound`] for an unknown id.
    pub fn set_connected(&self, player_id: PlayerId, connected: bool) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let player = inner
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(SessionError::PlayerNotFound)?;
        player.is_connected = connected;
        inner.updated_at = Utc::now();
        Ok(())
    }

    /// A cloned view of one player, if on the roster.
    pub fn player(&self, player_id: PlayerId) -> Option<Player> {
        self.lock().players.iter().find(|p| p.id == player_id).cloned()
    }

    /// Consistent point-in-time copy of all externally visible state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let current_turn = match (self.turn_policy, inner.status) {
            (TurnPolicy::Rotation, SessionStatus::Active) => {
                inner.players.get(inner.current_turn).map(|p| p.id)
            }
            _ => None,
        };
        SessionSnapshot {
            code: self.code.clone(),
            status: inner.status,
            creator_id: self.creator_id,
            winner_id: inner.winner_id,
            board: self.board.clone(),
            players: inner.players.clone(),
            current_turn,
            created_at: self.created_at,
            updated_at: inner.updated_at,
        }
    }
}

impl core::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameSession")
            .field("code", &self.code)
            .field("creator_id", &self.creator_id)
            .field("turn_policy", &self.turn_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn waiting_session(creator: &str) -> (GameSession, Player) {
        GameSession::new(
            GameCode::from_canonical(String::from("TEST42")),
            creator,
            Board::default_board(),
            TurnPolicy::FreeForAll,
            DEFAULT_MAX_PLAYERS,
        )
        .unwrap()
    }

    fn rotation_session(creator: &str) -> (GameSession, Player) {
        GameSession::new(
            GameCode::from_canonical(String::from("TEST42")),
            creator,
            Board::default_board(),
            TurnPolicy::Rotation,
            DEFAULT_MAX_PLAYERS,
        )
        .unwrap()
    }

    #[test]
    fn new_session_is_waiting_with_creator_on_roster() {
        let (session, creator) = waiting_session("Alice");
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.creator_id(), creator.id);
        let snap = session.snapshot();
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].name, "Alice");
        assert_eq!(snap.players[0].position, 0);
        assert!(snap.players[0].is_connected);
    }

    #[test]
    fn creator_name_is_trimmed_and_validated() {
        let (_, creator) = waiting_session("  Alice  ");
        assert_eq!(creator.name, "Alice");

        let result = GameSession::new(
            GameCode::from_canonical(String::from("TEST42")),
            "   ",
            Board::default_board(),
            TurnPolicy::FreeForAll,
            DEFAULT_MAX_PLAYERS,
        );
        assert!(matches!(result, Err(SessionError::InvalidName)));
    }

    #[test]
    fn join_rejects_empty_name_without_mutation() {
        let (session, _) = waiting_session("Alice");
        assert_eq!(session.join("  ").unwrap_err(), SessionError::InvalidName);
        assert_eq!(session.snapshot().players.len(), 1);
    }

    #[test]
    fn join_assigns_distinct_colors_in_join_order() {
        let (session, creator) = waiting_session("Alice");
        let bob = session.join("Bob").unwrap();
        let carol = session.join("Carol").unwrap();
        assert_ne!(creator.color, bob.color);
        assert_ne!(bob.color, carol.color);
        let snap = session.snapshot();
        assert_eq!(
            snap.players.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["Alice", "Bob", "Carol"]
        );
    }

    #[test]
    fn capacity_bound_is_enforced() {
        let (session, _) = waiting_session("P0");
        for i in 1..DEFAULT_MAX_PLAYERS {
            session.join(&format!("P{i}")).unwrap();
        }
        let err = session.join("Overflow").unwrap_err();
        assert_eq!(err, SessionError::GameFull);
        assert_eq!(session.snapshot().players.len(), DEFAULT_MAX_PLAYERS);
    }

    #[test]
    fn only_creator_can_start() {
        let (session, creator) = waiting_session("Alice");
        let bob = session.join("Bob").unwrap();

        assert_eq!(session.start(bob.id).unwrap_err(), SessionError::NotCreator);
        assert_eq!(session.status(), SessionStatus::Waiting);

        let first = session.start(creator.id).unwrap();
        assert_eq!(first, creator.id);
        assert_eq!(session.status(), SessionStatus::Active);

        // A second start by anyone fails and status is unchanged.
        assert_eq!(
            session.start(bob.id).unwrap_err(),
            SessionError::AlreadyStarted
        );
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn join_after_start_fails() {
        let (session, creator) = waiting_session("Alice");
        session.start(creator.id).unwrap();
        assert_eq!(
            session.join("Late").unwrap_err(),
            SessionError::AlreadyStarted
        );
    }

    #[test]
    fn roll_before_start_fails() {
        let (session, creator) = waiting_session("Alice");
        assert_eq!(
            session.roll(creator.id).unwrap_err(),
            SessionError::NotStarted
        );
    }

    #[test]
    fn roll_for_unknown_player_fails() {
        let (session, creator) = waiting_session("Alice");
        session.start(creator.id).unwrap();
        assert_eq!(
            session.roll(PlayerId::new()).unwrap_err(),
            SessionError::PlayerNotFound
        );
    }

    #[test]
    fn sequential_rolls_match_resolver_replay() {
        let (session, creator) = waiting_session("Alice");
        session.start(creator.id).unwrap();

        let board = Board::default_board();
        let mut expected = 0u16;
        for _ in 0..50 {
            match session.roll(creator.id) {
                Ok(outcome) => {
                    assert_eq!(outcome.previous_position, expected);
                    let replay = board.resolve(expected, outcome.roll);
                    assert_eq!(outcome.new_position, replay.new_position);
                    assert_eq!(outcome.won, replay.won);
                    expected = replay.new_position;
                    if outcome.won {
                        break;
                    }
                }
                Err(SessionError::NotStarted) => break, // finished earlier
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn concurrent_rolls_never_lose_an_update() {
        let (session, creator) = waiting_session("Alice");
        let bob = session.join("Bob").unwrap();
        session.start(creator.id).unwrap();
        let session = Arc::new(session);

        std::thread::scope(|scope| {
            for id in [creator.id, bob.id] {
                let session = Arc::clone(&session);
                scope.spawn(move || {
                    for _ in 0..200 {
                        // NotStarted here means someone already won.
                        if matches!(session.roll(id), Err(SessionError::NotStarted)) {
                            break;
                        }
                    }
                });
            }
        });

        let snap = session.snapshot();
        // Whatever the interleaving, every position is a legal square
        // and a finished session has its winner recorded.
        for player in &snap.players {
            assert!(player.position <= snap.board.size);
        }
        if snap.status == SessionStatus::Finished {
            assert!(snap.winner_id.is_some());
        }
    }

    #[test]
    fn winning_roll_finishes_session_and_rejects_further_play() {
        // A 5-square board with no links: position 0, any roll landing
        // exactly on 5 wins; keep rolling until it happens.
        let (session, creator) = GameSession::new(
            GameCode::from_canonical(String::from("TEST42")),
            "Alice",
            Board {
                size: 5,
                links: Vec::new(),
            },
            TurnPolicy::FreeForAll,
            DEFAULT_MAX_PLAYERS,
        )
        .unwrap();
        session.start(creator.id).unwrap();

        let mut won = false;
        for _ in 0..500 {
            let outcome = session.roll(creator.id).unwrap();
            if outcome.won {
                won = true;
                break;
            }
        }
        assert!(won, "500 rolls on a 5-square board should win");

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Finished);
        assert_eq!(snap.winner_id, Some(creator.id));

        assert_eq!(
            session.roll(creator.id).unwrap_err(),
            SessionError::NotStarted
        );
        assert_eq!(
            session.join("Late").unwrap_err(),
            SessionError::AlreadyStarted
        );
        assert_eq!(session.status(), SessionStatus::Finished);
    }

    #[test]
    fn set_connected_flips_flag_without_removing() {
        let (session, creator) = waiting_session("Alice");
        session.set_connected(creator.id, false).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.players.len(), 1);
        assert!(!snap.players[0].is_connected);

        assert_eq!(
            session.set_connected(PlayerId::new(), true).unwrap_err(),
            SessionError::PlayerNotFound
        );
    }

    #[test]
    fn rotation_policy_rejects_out_of_turn_rolls() {
        let (session, creator) = rotation_session("Alice");
        let bob = session.join("Bob").unwrap();
        session.start(creator.id).unwrap();

        assert_eq!(session.roll(bob.id).unwrap_err(), SessionError::NotYourTurn);

        let outcome = session.roll(creator.id).unwrap();
        if !outcome.won {
            assert_eq!(outcome.next_player, Some(bob.id));
            // Now it is Bob's turn and Alice is rejected.
            assert_eq!(
                session.roll(creator.id).unwrap_err(),
                SessionError::NotYourTurn
            );
            assert!(session.roll(bob.id).is_ok());
        }
    }

    #[test]
    fn free_for_all_lets_anyone_roll() {
        let (session, creator) = waiting_session("Alice");
        let bob = session.join("Bob").unwrap();
        session.start(creator.id).unwrap();

        assert!(session.roll(bob.id).is_ok());
        assert!(session.roll(bob.id).is_ok());
        assert!(session.roll(creator.id).is_ok());
    }

    #[test]
    fn snapshot_reports_turn_only_under_rotation() {
        let (session, creator) = rotation_session("Alice");
        session.join("Bob").unwrap();
        assert_eq!(session.snapshot().current_turn, None); // waiting
        session.start(creator.id).unwrap();
        assert_eq!(session.snapshot().current_turn, Some(creator.id));

        let (race, race_creator) = waiting_session("Alice");
        race.start(race_creator.id).unwrap();
        assert_eq!(race.snapshot().current_turn, None);
    }

    #[test]
    fn snapshot_projects_wire_forms() {
        let (session, creator) = waiting_session("Alice");
        let snap = session.snapshot();
        let info = snap.to_game_info();
        assert_eq!(info.code.as_str(), "TEST42");
        assert_eq!(info.status, SessionStatus::Waiting);
        assert_eq!(info.creator_id, creator.id);
        assert_eq!(info.board.size, 100);
        assert_eq!(info.board.links.len(), 20);

        let players = snap.to_player_infos();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].game_code.as_str(), "TEST42");
    }
}
