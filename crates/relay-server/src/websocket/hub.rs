//! Room connection registry.
//!
//! The [`Hub`] owns the room → connection mapping. Every mutation travels as
//! a [`HubCommand`] through one bounded channel and is applied by a single
//! coordinator task, so register, unregister, broadcast, and room disconnects
//! are totally ordered. Readers (`count`, `total_connections`) take a read
//! lock on the table and never mutate it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use parking_lot::RwLock;
use relay_core::{Broadcaster, ConnectionId, OutboundEnvelope, RoomId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, EnqueueOutcome};
use crate::metrics::{
    HUB_BROADCAST_RECIPIENTS, HUB_BROADCASTS_TOTAL, HUB_EVICTIONS_TOTAL, HUB_ROOMS_ACTIVE,
};

/// Outcome of fanning one envelope out to a room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued for.
    pub delivered: usize,
    /// Connections removed because their queue was full or closed.
    pub evicted: usize,
}

/// Room membership table. Only the coordinator task writes to it.
#[derive(Default)]
pub(crate) struct RoomTable {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl RoomTable {
    /// Add a connection to its room. Closed connections are ignored.
    pub(crate) fn register(&mut self, conn: Arc<ClientConnection>) -> bool {
        if conn.is_closed() {
            return false;
        }
        let _ = self
            .rooms
            .entry(conn.room_id)
            .or_default()
            .insert(conn.id.clone(), conn);
        true
    }

    /// Remove a connection and close its queue. Returns whether it was present.
    pub(crate) fn unregister(&mut self, conn: &ClientConnection) -> bool {
        let _ = conn.close();
        let Some(members) = self.rooms.get_mut(&conn.room_id) else {
            return false;
        };
        let removed = members.remove(&conn.id).is_some();
        if members.is_empty() {
            let _ = self.rooms.remove(&conn.room_id);
        }
        removed
    }

    /// Queue a payload for every member of the envelope's room.
    ///
    /// Members whose queue is full or closed are closed and removed in the
    /// same pass.
    pub(crate) fn broadcast(&mut self, envelope: &OutboundEnvelope) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let Some(members) = self.rooms.get_mut(&envelope.room_id) else {
            return report;
        };
        members.retain(|_, conn| match conn.try_enqueue(Arc::clone(&envelope.payload)) {
            EnqueueOutcome::Queued => {
                report.delivered += 1;
                true
            }
            outcome => {
                let _ = conn.close();
                report.evicted += 1;
                warn!(
                    conn_id = %conn.id,
                    room_id = %conn.room_id,
                    user_id = %conn.user_id,
                    ?outcome,
                    "evicting slow consumer"
                );
                false
            }
        });
        if members.is_empty() {
            let _ = self.rooms.remove(&envelope.room_id);
        }
        report
    }

    /// Close and remove every connection in a room. Returns how many there were.
    pub(crate) fn disconnect_room(&mut self, room_id: RoomId) -> usize {
        let Some(members) = self.rooms.remove(&room_id) else {
            return 0;
        };
        for conn in members.values() {
            let _ = conn.close();
        }
        members.len()
    }

    /// Close and remove every connection.
    pub(crate) fn close_all(&mut self) -> usize {
        let rooms: Vec<RoomId> = self.rooms.keys().copied().collect();
        rooms.into_iter().map(|room| self.disconnect_room(room)).sum()
    }

    pub(crate) fn count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map_or(0, HashMap::len)
    }

    pub(crate) fn total(&self) -> usize {
        self.rooms.values().map(HashMap::len).sum()
    }

    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    fn rooms_of(&self, conn_id: &ConnectionId) -> usize {
        self.rooms.values().filter(|m| m.contains_key(conn_id)).count()
    }

    #[cfg(test)]
    fn has_empty_room(&self) -> bool {
        self.rooms.values().any(HashMap::is_empty)
    }
}

/// A mutation for the coordinator task.
pub enum HubCommand {
    /// Add a connection to its room.
    Register(Arc<ClientConnection>),
    /// Remove a connection and close its queue.
    Unregister(Arc<ClientConnection>),
    /// Fan a payload out to a room.
    Broadcast(OutboundEnvelope),
    /// Close and remove every connection in a room.
    DisconnectRoom(RoomId),
    /// Acknowledged once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Handle to the connection registry.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    table: Arc<RwLock<RoomTable>>,
}

impl Hub {
    /// Start the coordinator task.
    ///
    /// The task exits when `cancel` fires or every handle is dropped, closing
    /// all remaining connections on the way out.
    pub fn spawn(capacity: usize, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(capacity.max(1));
        let table = Arc::new(RwLock::new(RoomTable::default()));
        let task = tokio::spawn(run_coordinator(rx, Arc::clone(&table), cancel));
        (Self { commands, table }, task)
    }

    /// Register a connection. Returns `false` if the hub has stopped.
    pub async fn register(&self, conn: Arc<ClientConnection>) -> bool {
        if self.commands.send(HubCommand::Register(Arc::clone(&conn))).await.is_err() {
            let _ = conn.close();
            return false;
        }
        true
    }

    /// Unregister a connection. Safe to call more than once.
    pub async fn unregister(&self, conn: Arc<ClientConnection>) {
        if let Err(mpsc::error::SendError(HubCommand::Unregister(conn))) =
            self.commands.send(HubCommand::Unregister(conn)).await
        {
            let _ = conn.close();
        }
    }

    /// Queue a payload for every connection in its room.
    pub async fn broadcast(&self, envelope: OutboundEnvelope) {
        if self.commands.send(HubCommand::Broadcast(envelope)).await.is_err() {
            debug!("hub stopped, broadcast discarded");
        }
    }

    /// Close every connection in a room.
    pub async fn disconnect_room(&self, room_id: RoomId) {
        if self.commands.send(HubCommand::DisconnectRoom(room_id)).await.is_err() {
            debug!(room_id = %room_id, "hub stopped, disconnect discarded");
        }
    }

    /// Wait until every command sent before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(HubCommand::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Live connections in a room.
    pub fn count(&self, room_id: RoomId) -> usize {
        self.table.read().count(room_id)
    }

    /// Live connections across all rooms.
    pub fn total_connections(&self) -> usize {
        self.table.read().total()
    }
}

#[async_trait]
impl Broadcaster for Hub {
    async fn broadcast(&self, envelope: OutboundEnvelope) {
        Hub::broadcast(self, envelope).await;
    }
}

async fn run_coordinator(
    mut rx: mpsc::Receiver<HubCommand>,
    table: Arc<RwLock<RoomTable>>,
    cancel: CancellationToken,
) {
    info!("hub started");
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        apply(&table, command);
    }
    let closed = table.write().close_all();
    gauge!(HUB_ROOMS_ACTIVE).set(0.0);
    info!(closed, "hub stopped");
}

fn apply(table: &RwLock<RoomTable>, command: HubCommand) {
    match command {
        HubCommand::Register(conn) => {
            let mut table = table.write();
            if table.register(Arc::clone(&conn)) {
                debug!(conn_id = %conn.id, room_id = %conn.room_id, members = table.count(conn.room_id), "registered");
            }
            set_rooms_gauge(&table);
        }
        HubCommand::Unregister(conn) => {
            let mut table = table.write();
            if table.unregister(&conn) {
                debug!(conn_id = %conn.id, room_id = %conn.room_id, "unregistered");
            }
            set_rooms_gauge(&table);
        }
        HubCommand::Broadcast(envelope) => {
            let mut table = table.write();
            let report = table.broadcast(&envelope);
            counter!(HUB_BROADCASTS_TOTAL).increment(1);
            record_recipients(report.delivered);
            if report.evicted > 0 {
                counter!(HUB_EVICTIONS_TOTAL).increment(report.evicted as u64);
                set_rooms_gauge(&table);
            }
            debug!(room_id = %envelope.room_id, delivered = report.delivered, evicted = report.evicted, "broadcast");
        }
        HubCommand::DisconnectRoom(room_id) => {
            let mut table = table.write();
            let closed = table.disconnect_room(room_id);
            set_rooms_gauge(&table);
            info!(room_id = %room_id, closed, "room disconnected");
        }
        HubCommand::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_recipients(delivered: usize) {
    histogram!(HUB_BROADCAST_RECIPIENTS).record(delivered as f64);
}

#[allow(clippy::cast_precision_loss)]
fn set_rooms_gauge(table: &RoomTable) {
    gauge!(HUB_ROOMS_ACTIVE).set(table.room_count() as f64);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
