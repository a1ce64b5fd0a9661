//! Observer tracking and event fan-out.
//!
//! The [`GameHub`] knows, for every session code, which observers are
//! attached, and delivers one serialized copy of each event to each of
//! them. It is transport-agnostic: an observer is just an id plus a
//! bounded outbound queue of pre-serialized frames, and the push
//! adapter drains that queue into its socket.
//!
//! # Delivery guarantees
//!
//! Fan-out serializes the event once, snapshots the attachment set
//! under a short mutex, then delivers outside any lock with a
//! non-blocking `try_send`. A full queue drops the frame for that
//! observer and logs the drop: a slow observer never blocks the hub,
//! the publisher, or other observers. Delivery is best-effort; clients
//! that need guaranteed convergence reconcile through the poll
//! adapter's full-state snapshots.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chutes_types::{ConnectionId, GameCode, PlayerId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of each observer's outbound frame queue.
pub const OBSERVER_QUEUE_CAPACITY: usize = 256;

/// One attached observer: an id plus the sending half of its queue.
#[derive(Debug, Clone)]
pub struct Observer {
    /// Unique connection id.
    pub id: ConnectionId,
    /// Sending half of the bounded outbound queue.
    tx: mpsc::Sender<String>,
}

impl Observer {
    /// Create an observer and the receiving half of its queue.
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_CAPACITY);
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    /// Non-blocking enqueue. Returns false when the queue is full or
    /// the receiver is gone.
    fn try_deliver(&self, frame: String) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

struct Attachment {
    observer: Observer,
    game: Option<GameCode>,
    player: Option<PlayerId>,
}

#[derive(Default)]
struct HubInner {
    attachments: HashMap<ConnectionId, Attachment>,
    groups: HashMap<GameCode, HashSet<ConnectionId>>,
}

impl HubInner {
    fn remove_from_group(&mut self, id: ConnectionId, code: &GameCode) {
        if let Some(members) = self.groups.get_mut(code) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(code);
            }
        }
    }
}

/// Tracks attached observers per session and fans events out to them.
#[derive(Default)]
pub struct GameHub {
    inner: Mutex<HubInner>,
}

impl GameHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer with the hub. Until [`bind`](Self::bind) is
    /// called it belongs to no session group.
    pub fn attach(&self, observer: Observer) {
        let id = observer.id;
        self.lock().attachments.insert(
            id,
            Attachment {
                observer,
                game: None,
                player: None,
            },
        );
        debug!(observer = %id, "observer attached");
    }

    /// Remove an observer. Idempotent; after this returns, no further
    /// delivery to the observer can originate from the hub (frames
    /// already queued may still drain).
    pub fn detach(&self, id: ConnectionId) {
        let mut inner = self.lock();
        if let Some(attachment) = inner.attachments.remove(&id) {
            if let Some(code) = attachment.game {
                inner.remove_from_group(id, &code);
            }
            debug!(observer = %id, "observer detached");
        }
    }

    /// Move an observer into the group for `code`, leaving any prior
    /// group, and record which player it speaks for.
    pub fn bind(&self, id: ConnectionId, code: GameCode, player: PlayerId) {
        let mut inner = self.lock();
        let Some(attachment) = inner.attachments.get_mut(&id) else {
            return;
        };
        let previous = attachment.game.replace(code.clone());
        attachment.player = Some(player);

        if let Some(prev) = previous
            && prev != code
        {
            inner.remove_from_group(id, &prev);
        }
        inner.groups.entry(code).or_default().insert(id);
    }

    /// The session and player an observer is bound to, if any.
    pub fn binding(&self, id: ConnectionId) -> Option<(GameCode, PlayerId)> {
        let inner = self.lock();
        let attachment = inner.attachments.get(&id)?;
        Some((attachment.game.clone()?, attachment.player?))
    }

    /// Deliver an event to every observer attached to `code`.
    pub fn publish(&self, code: &GameCode, event: &ServerEvent) {
        self.fan_out(code, None, event);
    }

    /// Deliver an event to every observer attached to `code` except
    /// one, typically the actor that already received a direct reply.
    pub fn publish_except(&self, code: &GameCode, excluded: ConnectionId, event: &ServerEvent) {
        self.fan_out(code, Some(excluded), event);
    }

    /// Deliver an event to exactly one observer.
    pub fn send_direct(&self, id: ConnectionId, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };
        let observer = {
            let inner = self.lock();
            inner.attachments.get(&id).map(|a| a.observer.clone())
        };
        if let Some(observer) = observer
            && !observer.try_deliver(frame)
        {
            warn!(observer = %id, "dropping frame: observer queue full or closed");
        }
    }

    /// Total attached observers.
    pub fn observer_count(&self) -> usize {
        self.lock().attachments.len()
    }

    /// Observers attached to one session.
    pub fn game_observer_count(&self, code: &GameCode) -> usize {
        self.lock().groups.get(code).map_or(0, HashSet::len)
    }

    fn fan_out(&self, code: &GameCode, excluded: Option<ConnectionId>, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };

        // Snapshot the recipients under the lock, deliver outside it.
        let recipients: Vec<Observer> = {
            let inner = self.lock();
            inner
                .groups
                .get(code)
                .map(|members| {
                    members
                        .iter()
                        .filter(|id| Some(**id) != excluded)
                        .filter_map(|id| inner.attachments.get(id))
                        .map(|a| a.observer.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        for observer in recipients {
            if !observer.try_deliver(frame.clone()) {
                warn!(
                    observer = %observer.id,
                    game = %code,
                    "dropping frame: observer queue full or closed"
                );
            }
        }
    }
}

impl core::fmt::Debug for GameHub {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameHub")
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}

/// Serialize an event once for fan-out. A serialization failure is a
/// programming error in the event types; it is logged and the event is
/// not delivered.
fn serialize(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("failed to serialize event: {e}");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chutes_types::ErrorCode;

    fn code(s: &str) -> GameCode {
        GameCode::from_canonical(String::from(s))
    }

    #[tokio::test]
    async fn bound_observer_receives_published_events() {
        let hub = GameHub::new();
        let (observer, mut rx) = Observer::new();
        let id = observer.id;
        hub.attach(observer);
        hub.bind(id, code("AAAA22"), PlayerId::new());

        hub.publish(&code("AAAA22"), &ServerEvent::Pong);

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "pong");
    }

    #[tokio::test]
    async fn unbound_observer_receives_nothing_from_publish() {
        let hub = GameHub::new();
        let (observer, mut rx) = Observer::new();
        hub.attach(observer);

        hub.publish(&code("AAAA22"), &ServerEvent::Pong);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_except_skips_the_excluded_observer() {
        let hub = GameHub::new();
        let (actor, mut actor_rx) = Observer::new();
        let (other, mut other_rx) = Observer::new();
        let actor_id = actor.id;
        let other_id = other.id;
        hub.attach(actor);
        hub.attach(other);
        hub.bind(actor_id, code("AAAA22"), PlayerId::new());
        hub.bind(other_id, code("AAAA22"), PlayerId::new());

        hub.publish_except(&code("AAAA22"), actor_id, &ServerEvent::Pong);

        assert!(actor_rx.try_recv().is_err());
        assert!(other_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_direct_reaches_exactly_one_observer() {
        let hub = GameHub::new();
        let (a, mut a_rx) = Observer::new();
        let (b, mut b_rx) = Observer::new();
        let a_id = a.id;
        hub.attach(a);
        hub.attach(b);

        hub.send_direct(a_id, &ServerEvent::error(ErrorCode::GameNotFound, "no"));

        assert!(a_rx.recv().await.is_some());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn detached_observer_never_receives_later_events() {
        let hub = GameHub::new();
        let (observer, mut rx) = Observer::new();
        let id = observer.id;
        hub.attach(observer);
        hub.bind(id, code("AAAA22"), PlayerId::new());

        hub.detach(id);
        hub.detach(id); // idempotent

        hub.publish(&code("AAAA22"), &ServerEvent::Pong);
        hub.send_direct(id, &ServerEvent::Pong);
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.observer_count(), 0);
        assert_eq!(hub.game_observer_count(&code("AAAA22")), 0);
    }

    #[tokio::test]
    async fn rebinding_moves_the_observer_between_groups() {
        let hub = GameHub::new();
        let (observer, mut rx) = Observer::new();
        let id = observer.id;
        hub.attach(observer);
        hub.bind(id, code("AAAA22"), PlayerId::new());
        hub.bind(id, code("BBBB33"), PlayerId::new());

        assert_eq!(hub.game_observer_count(&code("AAAA22")), 0);
        assert_eq!(hub.game_observer_count(&code("BBBB33")), 1);

        hub.publish(&code("AAAA22"), &ServerEvent::Pong);
        assert!(rx.try_recv().is_err());
        hub.publish(&code("BBBB33"), &ServerEvent::Pong);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_queue_drops_frames_without_blocking() {
        let hub = GameHub::new();
        let (observer, mut rx) = Observer::new();
        let id = observer.id;
        hub.attach(observer);
        hub.bind(id, code("AAAA22"), PlayerId::new());

        // Never drained: overflow past the queue capacity must not
        // block the publisher.
        for _ in 0..(OBSERVER_QUEUE_CAPACITY + 50) {
            hub.publish(&code("AAAA22"), &ServerEvent::Pong);
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, OBSERVER_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn binding_is_reported() {
        let hub = GameHub::new();
        let (observer, _rx) = Observer::new();
        let id = observer.id;
        let player = PlayerId::new();
        hub.attach(observer);
        assert!(hub.binding(id).is_none());

        hub.bind(id, code("AAAA22"), player);
        assert_eq!(hub.binding(id), Some((code("AAAA22"), player)));
    }
}
