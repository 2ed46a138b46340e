//! Wiring: settings → repositories, services, hub, and server.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::{JwtAuth, PasswordConfig, PasswordHasher};
use relay_core::{Broadcaster, MessageGateway, RoomAccessPolicy, TokenVerifier};
use relay_settings::RelaySettings;
use relay_store::{
    DEFAULT_ROOM_ID, MessageLimits, MessageService, Repositories, RoomService, StoreError,
    UserService,
};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::server::{AppState, RelayServer};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::Hub;
use crate::websocket::session::SessionDeps;

/// Build a ready-to-listen server.
///
/// `settings` drives the services; `config` drives the listener and the
/// per-connection transport. Must run inside a Tokio runtime because the
/// hub coordinator is spawned here.
pub fn build(
    settings: &RelaySettings,
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<RelayServer, StoreError> {
    let hasher = PasswordHasher::new(PasswordConfig {
        memory_cost: settings.auth.password_memory_kib,
        time_cost: settings.auth.password_iterations,
        parallelism: 1,
    })?;

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let (hub, hub_task) = Hub::spawn(config.hub_command_capacity, shutdown.token());

    let repos = Repositories::new();
    let auth = Arc::new(JwtAuth::new(
        &settings.auth.jwt_secret,
        settings.auth.jwt_expiry_hours,
        &settings.auth.issuer,
    ));
    if settings.auth.uses_dev_secret() {
        warn!("using the development JWT secret; set JWT_SECRET in production");
    }

    let users = Arc::new(UserService::new(Arc::clone(&repos.users), Arc::clone(&auth), hasher));
    let rooms = Arc::new(RoomService::new(repos.clone()));
    let broadcaster: Arc<dyn Broadcaster> = Arc::new(hub.clone());
    let messages = Arc::new(MessageService::new(
        repos,
        broadcaster,
        MessageLimits {
            max_length: settings.messages.max_length,
            history_default: settings.messages.history_default_limit,
            history_max: settings.messages.history_max_limit,
        },
    ));

    let default_room = rooms.ensure_default_room(&settings.rooms.default_room_name)?;
    if default_room.id != DEFAULT_ROOM_ID {
        warn!(room_id = %default_room.id, "default room did not receive the reserved ID");
    }
    info!(room_id = %default_room.id, name = %default_room.name, "default room ready");

    let gateway: Arc<dyn MessageGateway> = messages.clone();
    let session = SessionDeps {
        hub: hub.clone(),
        gateway,
        access: Arc::clone(&rooms) as Arc<dyn RoomAccessPolicy>,
        queue_capacity: config.outbound_queue_capacity,
        inbound: config.inbound_limits(),
        outbound: config.outbound_timing(),
    };

    let state = AppState {
        hub,
        users,
        rooms: Arc::clone(&rooms),
        messages,
        verifier: auth as Arc<dyn TokenVerifier>,
        access: rooms as Arc<dyn RoomAccessPolicy>,
        session,
        max_message_size: config.max_message_size,
        start_time: Instant::now(),
        metrics,
    };

    Ok(RelayServer::new(config, state, shutdown, hub_task))
}
