//! Outbound pump: drains a connection's queue to the transport and sends
//! heartbeat pings.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use relay_core::UserId;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::debug;

/// Write-side timing for one connection.
#[derive(Clone, Copy, Debug)]
pub struct OutboundTiming {
    /// Interval between transport-level pings.
    pub ping_interval: Duration,
    /// Deadline for each individual write.
    pub write_timeout: Duration,
}

/// Why the outbound pump stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboundExit {
    /// The queue was closed; a close frame was attempted.
    QueueClosed,
    /// A write failed.
    WriteFailed,
    /// A write did not finish within the write timeout.
    WriteTimedOut,
}

impl OutboundExit {
    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueueClosed => "queue_closed",
            Self::WriteFailed => "write_failed",
            Self::WriteTimedOut => "write_timed_out",
        }
    }
}

/// Write queued payloads in order until the queue closes or a write fails.
///
/// A ping carrying the user ID as decimal text goes out every
/// `ping_interval`; a failed ping ends the pump like a failed payload write.
pub async fn run_outbound<K>(
    mut sink: K,
    mut queue: mpsc::Receiver<Arc<String>>,
    user_id: UserId,
    timing: OutboundTiming,
) -> OutboundExit
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let mut ping_interval = tokio::time::interval(timing.ping_interval);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;
    let ping_payload = user_id.to_string();

    loop {
        let msg = tokio::select! {
            payload = queue.recv() => match payload {
                Some(payload) => Message::Text(payload.as_str().into()),
                None => {
                    let _ = timeout(timing.write_timeout, sink.send(Message::Close(None))).await;
                    return OutboundExit::QueueClosed;
                }
            },
            _ = ping_interval.tick() => Message::Ping(ping_payload.clone().into_bytes().into()),
        };

        match timeout(timing.write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(user_id = %user_id, error = %e, "transport write failed");
                return OutboundExit::WriteFailed;
            }
            Err(_) => {
                debug!(user_id = %user_id, "transport write timed out");
                return OutboundExit::WriteTimedOut;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
