//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Room connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Room connections closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live room connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Inbound frames dropped without reaching the gateway (counter, labels: reason).
pub const WS_FRAMES_DROPPED_TOTAL: &str = "ws_frames_dropped_total";
/// Broadcast commands applied by the hub (counter).
pub const HUB_BROADCASTS_TOTAL: &str = "hub_broadcasts_total";
/// Connections a broadcast was queued for (histogram).
pub const HUB_BROADCAST_RECIPIENTS: &str = "hub_broadcast_recipients";
/// Connections evicted during fan-out because their queue was full (counter).
pub const HUB_EVICTIONS_TOTAL: &str = "hub_evictions_total";
/// Rooms with at least one live connection (gauge).
pub const HUB_ROOMS_ACTIVE: &str = "hub_rooms_active";
/// Chat messages accepted by the gateway (counter).
pub const MESSAGES_ACCEPTED_TOTAL: &str = "messages_accepted_total";
/// Chat messages refused by the gateway (counter, labels: reason).
pub const GATEWAY_REJECTIONS_TOTAL: &str = "gateway_rejections_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_FRAMES_DROPPED_TOTAL,
            HUB_BROADCASTS_TOTAL,
            HUB_BROADCAST_RECIPIENTS,
            HUB_EVICTIONS_TOTAL,
            HUB_ROOMS_ACTIVE,
            MESSAGES_ACCEPTED_TOTAL,
            GATEWAY_REJECTIONS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name not snake_case: {name}"
            );
        }
    }
}
