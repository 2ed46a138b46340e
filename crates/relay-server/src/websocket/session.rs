//! Room connection lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use metrics::{counter, gauge, histogram};
use relay_core::{Identity, MessageGateway, RoomAccessPolicy, RoomId};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::connection::ClientConnection;
use super::hub::Hub;
use super::inbound::{InboundLimits, run_inbound};
use super::outbound::{OutboundTiming, run_outbound};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Everything a session needs besides its socket.
#[derive(Clone)]
pub struct SessionDeps {
    /// Connection registry.
    pub hub: Hub,
    /// Where chat content goes.
    pub gateway: Arc<dyn MessageGateway>,
    /// Room access, re-checked after registration.
    pub access: Arc<dyn RoomAccessPolicy>,
    /// Outbound queue capacity per connection.
    pub queue_capacity: usize,
    /// Read-side limits.
    pub inbound: InboundLimits,
    /// Write-side timing.
    pub outbound: OutboundTiming,
}

/// Register `conn` and confirm its room still admits the user.
///
/// A deletion after this check is queued behind the registration, so the
/// hub disconnects the connection with the rest of the room.
async fn admit(hub: &Hub, access: &dyn RoomAccessPolicy, conn: &Arc<ClientConnection>) -> bool {
    if !hub.register(Arc::clone(conn)).await {
        warn!(conn_id = %conn.id, "hub unavailable, dropping connection");
        return false;
    }
    match access.can_access(conn.room_id, conn.user_id).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(conn_id = %conn.id, "access revoked during upgrade");
            hub.unregister(Arc::clone(conn)).await;
            false
        }
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "room gone during upgrade");
            hub.unregister(Arc::clone(conn)).await;
            false
        }
    }
}

/// Run a room connection for an authenticated, authorized client.
///
/// 1. Registers the connection with the hub, dropping it if the room
///    vanished in the meantime
/// 2. Spawns the outbound pump (queue → socket, heartbeat pings)
/// 3. Runs the inbound pump (socket → pong replies or gateway calls)
/// 4. Unregisters once either side stops, then lets the outbound pump
///    flush and send its close frame
#[instrument(skip_all, fields(room_id = %room_id, user_id = %identity.user_id))]
pub async fn run_ws_session(ws: WebSocket, room_id: RoomId, identity: Identity, deps: SessionDeps) {
    let (conn, queue) = ClientConnection::new(
        room_id,
        identity.user_id,
        identity.username,
        deps.queue_capacity,
    );
    let (ws_tx, ws_rx) = ws.split();

    if !admit(&deps.hub, deps.access.as_ref(), &conn).await {
        return;
    }

    info!(conn_id = %conn.id, username = %conn.username, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Either pump stopping ends the session.
    let cancel = CancellationToken::new();
    let mut outbound = {
        let cancel = cancel.clone();
        let user_id = conn.user_id;
        let timing = deps.outbound;
        tokio::spawn(async move {
            let exit = run_outbound(ws_tx, queue, user_id, timing).await;
            cancel.cancel();
            exit
        })
    };

    let inbound_exit = run_inbound(ws_rx, &conn, deps.gateway.as_ref(), deps.inbound, &cancel).await;
    deps.hub.unregister(Arc::clone(&conn)).await;

    let drain = deps.outbound.write_timeout * 2;
    let outbound_exit = match tokio::time::timeout(drain, &mut outbound).await {
        Ok(Ok(exit)) => Some(exit.as_str()),
        Ok(Err(e)) => {
            warn!(conn_id = %conn.id, error = %e, "outbound pump panicked");
            None
        }
        Err(_) => {
            outbound.abort();
            None
        }
    };

    info!(
        conn_id = %conn.id,
        inbound = inbound_exit.as_str(),
        outbound = outbound_exit.unwrap_or("aborted"),
        dropped = conn.drop_count(),
        idle_ms = u64::try_from(conn.idle_for().as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => inbound_exit.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(conn.age().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{AccessError, UserId};
    use tokio_util::sync::CancellationToken;

    const ROOM: RoomId = RoomId::new(3);

    struct FixedAccess(Result<bool, AccessError>);

    #[async_trait]
    impl RoomAccessPolicy for FixedAccess {
        async fn can_access(&self, _room_id: RoomId, _user_id: UserId) -> Result<bool, AccessError> {
            self.0.clone()
        }
    }

    fn conn() -> (Arc<ClientConnection>, tokio::sync::mpsc::Receiver<Arc<String>>) {
        ClientConnection::new(ROOM, UserId::new(1), "alice", 4)
    }

    #[tokio::test]
    async fn admit_keeps_connection_in_live_room() {
        let (hub, _task) = Hub::spawn(16, CancellationToken::new());
        let (conn, _queue) = conn();
        assert!(admit(&hub, &FixedAccess(Ok(true)), &conn).await);
        hub.flush().await;
        assert_eq!(hub.count(ROOM), 1);
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn admit_sheds_connection_when_room_was_deleted() {
        let (hub, _task) = Hub::spawn(16, CancellationToken::new());
        let (conn, _queue) = conn();
        let access = FixedAccess(Err(AccessError::RoomNotFound(ROOM)));
        assert!(!admit(&hub, &access, &conn).await);
        hub.flush().await;
        assert_eq!(hub.count(ROOM), 0);
        assert_eq!(hub.total_connections(), 0);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn admit_sheds_connection_when_access_was_revoked() {
        let (hub, _task) = Hub::spawn(16, CancellationToken::new());
        let (conn, _queue) = conn();
        assert!(!admit(&hub, &FixedAccess(Ok(false)), &conn).await);
        hub.flush().await;
        assert_eq!(hub.count(ROOM), 0);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn admit_fails_once_hub_has_stopped() {
        let cancel = CancellationToken::new();
        let (hub, task) = Hub::spawn(16, cancel.clone());
        cancel.cancel();
        task.await.unwrap();
        let (conn, _queue) = conn();
        assert!(!admit(&hub, &FixedAccess(Ok(true)), &conn).await);
        assert!(conn.is_closed());
    }
}
