//! Background retention sweeps.
//!
//! Two periodic tasks keep the in-memory state bounded: one evicts
//! sessions past the configured age (finished or not), the other
//! disconnects poll connections that have gone silent. Both run on
//! plain intervals and exit when the shutdown signal flips.
//!
//! A swept poll connection gets the same treatment as an explicit
//! `POST /poll/disconnect`: its bound player is marked disconnected
//! and the remaining observers are told.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::actions;
use crate::state::AppState;

/// Spawn both retention sweeps. The returned handles complete after
/// the shutdown signal flips.
pub fn spawn(state: &Arc<AppState>, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(session_sweep(Arc::clone(state), shutdown.clone())),
        tokio::spawn(poll_sweep(Arc::clone(state), shutdown.clone())),
    ]
}

async fn session_sweep(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.config.retention.session_sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // the immediate first tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = state
                    .registry
                    .evict_older_than(state.config.retention.session_max_age());
                if evicted > 0 {
                    info!(evicted, remaining = state.registry.count(), "session sweep");
                }
            }
            _ = shutdown.wait_for(|stop| *stop) => return,
        }
    }
}

async fn poll_sweep(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.config.retention.poll_sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_stale_polls(&state, state.config.retention.poll_staleness());
            }
            _ = shutdown.wait_for(|stop| *stop) => return,
        }
    }
}

/// One pass of the stale-poll sweep. Each evicted connection gets the
/// explicit-disconnect treatment: its bound player is marked
/// disconnected and remaining observers are told. Returns the number
/// of connections swept.
pub fn sweep_stale_polls(state: &AppState, staleness: chrono::Duration) -> usize {
    let stale = state.polls.evict_stale(staleness);
    if stale.is_empty() {
        return 0;
    }
    info!(count = stale.len(), "disconnecting stale poll connections");
    let count = stale.len();
    for conn in stale {
        if let (Some(code), Some(player)) = (conn.game, conn.player) {
            actions::disconnect_player(state, &code, player, None);
        }
    }
    count
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chutes_core::ChutesConfig;
    use chutes_hub::Observer;

    #[tokio::test]
    async fn stale_poll_sweep_disconnects_like_an_explicit_disconnect() {
        let state = AppState::new(ChutesConfig::default());
        let (session, creator) = state.registry.create("Alice").unwrap();
        let code = session.code().clone();
        let bob = session.join("Bob").unwrap();

        // Bob polls; Alice watches over the push transport.
        let conn = state.polls.add();
        state.polls.bind(conn, code.clone(), bob.id);
        let (observer, mut rx) = Observer::new();
        let observer_id = observer.id;
        state.hub.attach(observer);
        state.hub.bind(observer_id, code, creator.id);

        // A generous threshold keeps the fresh connection alive.
        assert_eq!(sweep_stale_polls(&state, chrono::Duration::hours(1)), 0);
        assert_eq!(state.polls.count(), 1);
        assert!(rx.try_recv().is_err());

        // A negative threshold makes it stale immediately.
        assert_eq!(sweep_stale_polls(&state, chrono::Duration::seconds(-1)), 1);
        assert_eq!(state.polls.count(), 0);
        assert!(!session.player(bob.id).unwrap().is_connected);

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "playerLeft");
        assert_eq!(value["playerName"], "Bob");
    }

    #[tokio::test]
    async fn sweeping_an_unbound_connection_announces_nothing() {
        let state = AppState::new(ChutesConfig::default());
        let (session, creator) = state.registry.create("Alice").unwrap();
        let code = session.code().clone();

        let _conn = state.polls.add(); // never joined a game
        let (observer, mut rx) = Observer::new();
        let observer_id = observer.id;
        state.hub.attach(observer);
        state.hub.bind(observer_id, code, creator.id);

        assert_eq!(sweep_stale_polls(&state, chrono::Duration::seconds(-1)), 1);
        assert_eq!(state.polls.count(), 0);
        assert!(rx.try_recv().is_err());
    }
}
