//! Inbound pump: client frames → control replies or gateway calls.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use metrics::counter;
use relay_core::{InboundFrame, MessageGateway, PONG_FRAME};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::{ClientConnection, EnqueueOutcome};
use crate::metrics::{GATEWAY_REJECTIONS_TOTAL, MESSAGES_ACCEPTED_TOTAL, WS_FRAMES_DROPPED_TOTAL};

/// Read-side limits for one connection.
#[derive(Clone, Copy, Debug)]
pub struct InboundLimits {
    /// Longest silence tolerated before the connection is torn down.
    pub read_timeout: Duration,
    /// Frames larger than this are dropped unread.
    pub max_frame_bytes: usize,
}

/// Why the inbound pump stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundExit {
    /// The client sent a close frame.
    ClientClosed,
    /// The transport stream ended.
    StreamEnded,
    /// The transport returned an error.
    ReadError,
    /// Nothing refreshed the read deadline in time.
    TimedOut,
    /// The session was cancelled, usually because the outbound side stopped.
    Cancelled,
}

impl InboundExit {
    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::ReadError => "read_error",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Read frames until the transport fails, the client leaves, the read
/// deadline passes, or `cancel` fires.
///
/// The deadline is pushed back by every parsed frame and every transport
/// ping or pong. Malformed, oversized, and empty frames are dropped and the
/// connection stays open. Gateway rejections are dropped without a reply.
pub async fn run_inbound<S, E>(
    mut stream: S,
    conn: &ClientConnection,
    gateway: &dyn MessageGateway,
    limits: InboundLimits,
    cancel: &CancellationToken,
) -> InboundExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + limits.read_timeout;
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return InboundExit::Cancelled,
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };
        let msg = match next {
            Err(_) => return InboundExit::TimedOut,
            Ok(None) => return InboundExit::StreamEnded,
            Ok(Some(Err(e))) => {
                debug!(conn_id = %conn.id, error = %e, "transport read failed");
                return InboundExit::ReadError;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        let refreshed = match &msg {
            Message::Text(text) => handle_text(text.as_str(), conn, gateway, limits).await,
            Message::Binary(data) => {
                if let Ok(text) = std::str::from_utf8(data) {
                    handle_text(text, conn, gateway, limits).await
                } else {
                    drop_frame(conn, "non_utf8");
                    false
                }
            }
            Message::Ping(_) | Message::Pong(_) => true,
            Message::Close(_) => return InboundExit::ClientClosed,
        };

        if refreshed {
            conn.touch();
            deadline = Instant::now() + limits.read_timeout;
        }
    }
}

/// Handle one text frame. Returns whether it parsed.
async fn handle_text(
    text: &str,
    conn: &ClientConnection,
    gateway: &dyn MessageGateway,
    limits: InboundLimits,
) -> bool {
    if text.len() > limits.max_frame_bytes {
        drop_frame(conn, "oversized");
        return false;
    }
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn_id = %conn.id, error = %e, "dropping frame");
            drop_frame(conn, "malformed");
            return false;
        }
    };

    match frame {
        InboundFrame::Ping => {
            let outcome = conn.try_enqueue(Arc::new(PONG_FRAME.to_string()));
            if outcome != EnqueueOutcome::Queued {
                debug!(conn_id = %conn.id, ?outcome, "pong not queued");
            }
        }
        InboundFrame::Pong => {}
        InboundFrame::Chat { content } if content.is_empty() => {
            drop_frame(conn, "empty_content");
        }
        InboundFrame::Chat { content } => {
            match gateway.send(conn.room_id, conn.user_id, &content).await {
                Ok(message) => {
                    counter!(MESSAGES_ACCEPTED_TOTAL).increment(1);
                    debug!(conn_id = %conn.id, message_id = %message.id, "message accepted");
                }
                Err(e) => {
                    counter!(GATEWAY_REJECTIONS_TOTAL, "reason" => e.reason()).increment(1);
                    debug!(conn_id = %conn.id, error = %e, "message rejected");
                }
            }
        }
    }
    true
}

fn drop_frame(conn: &ClientConnection, reason: &'static str) {
    counter!(WS_FRAMES_DROPPED_TOTAL, "reason" => reason).increment(1);
    debug!(conn_id = %conn.id, reason, "frame dropped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
