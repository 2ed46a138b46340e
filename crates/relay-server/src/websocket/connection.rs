//! Room connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::{ConnectionId, RoomId, UserId};
use tokio::sync::mpsc;

/// Result of a non-blocking enqueue onto a connection's outbound queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The payload was queued.
    Queued,
    /// The queue is at capacity.
    Full,
    /// The queue has been closed.
    Closed,
}

/// One live connection bound to a single room.
///
/// The connection owns the only sender of its outbound queue. Dropping that
/// sender via [`ClientConnection::close`] is how the outbound pump learns it
/// must stop.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Room this connection belongs to.
    pub room_id: RoomId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Username at connect time.
    pub username: String,
    /// Sender side of the outbound queue. `None` once closed.
    queue: Mutex<Option<mpsc::Sender<Arc<String>>>>,
    /// When this connection was established.
    connected_at: Instant,
    /// Last successfully parsed frame or pong.
    last_activity: Mutex<Instant>,
    /// Count of payloads refused because the queue was full or closed.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection and the receiver its outbound pump drains.
    pub fn new(
        room_id: RoomId,
        user_id: UserId,
        username: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let now = Instant::now();
        let conn = Self {
            id: ConnectionId::new(),
            room_id,
            user_id,
            username: username.into(),
            queue: Mutex::new(Some(tx)),
            connected_at: now,
            last_activity: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        };
        (Arc::new(conn), rx)
    }

    /// Try to queue a payload without waiting.
    pub fn try_enqueue(&self, payload: Arc<String>) -> EnqueueOutcome {
        let queue = self.queue.lock();
        let outcome = match queue.as_ref() {
            None => EnqueueOutcome::Closed,
            Some(tx) => match tx.try_send(payload) {
                Ok(()) => return EnqueueOutcome::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::Full,
                Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
            },
        };
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Close the outbound queue. Returns `false` if it was already closed.
    ///
    /// Payloads already queued are still delivered before the pump stops.
    pub fn close(&self) -> bool {
        self.queue.lock().take().is_some()
    }

    /// Whether the outbound queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.queue.lock().as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    /// Record client activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Total payloads dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("room_id", &self.room_id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        ClientConnection::new(RoomId::new(7), UserId::new(1), "alice", capacity)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.room_id, RoomId::new(7));
        assert_eq!(conn.username, "alice");
        assert!(!conn.is_closed());
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn enqueue_delivers_in_order() {
        let (conn, mut rx) = make_connection(4);
        assert_eq!(conn.try_enqueue(Arc::new("one".into())), EnqueueOutcome::Queued);
        assert_eq!(conn.try_enqueue(Arc::new("two".into())), EnqueueOutcome::Queued);
        assert_eq!(&*rx.recv().await.unwrap(), "one");
        assert_eq!(&*rx.recv().await.unwrap(), "two");
    }

    #[test]
    fn full_queue_is_reported() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.try_enqueue(Arc::new("a".into())), EnqueueOutcome::Queued);
        assert_eq!(conn.try_enqueue(Arc::new("b".into())), EnqueueOutcome::Full);
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (conn, _rx) = make_connection(0);
        assert_eq!(conn.try_enqueue(Arc::new("a".into())), EnqueueOutcome::Queued);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_receiver() {
        let (conn, mut rx) = make_connection(4);
        assert_eq!(conn.try_enqueue(Arc::new("last".into())), EnqueueOutcome::Queued);
        assert!(conn.close());
        assert!(!conn.close());
        assert!(conn.is_closed());
        assert_eq!(conn.try_enqueue(Arc::new("late".into())), EnqueueOutcome::Closed);
        assert_eq!(&*rx.recv().await.unwrap(), "last");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropped_receiver_reads_as_closed() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(conn.is_closed());
        assert_eq!(conn.try_enqueue(Arc::new("x".into())), EnqueueOutcome::Closed);
    }

    #[test]
    fn touch_resets_idle_time() {
        let (conn, _rx) = make_connection(4);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.idle_for() >= Duration::from_millis(20));
        conn.touch();
        assert!(conn.idle_for() < Duration::from_millis(20));
    }

    #[test]
    fn age_is_not_reset_by_activity() {
        let (conn, _rx) = make_connection(4);
        std::thread::sleep(Duration::from_millis(20));
        conn.touch();
        assert!(conn.age() >= Duration::from_millis(20));
        assert!(conn.age() > conn.idle_for());
    }

    #[test]
    fn ids_are_unique() {
        let (a, _ra) = make_connection(1);
        let (b, _rb) = make_connection(1);
        assert_ne!(a.id, b.id);
    }
}
