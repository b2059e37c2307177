//! Per-session forwarding relay.
//!
//! A [`Session`] exists only after the gateway has matched the device's
//! credentials. [`Session::relay`] then owns the connection until it closes:
//! each inbound telemetry message is parsed, handed to the downstream
//! forwarder on its own task, and echoed back verbatim. Only failures of the
//! device-facing socket, or a message that does not parse, end the session.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use tokio::task::JoinSet;

use sensorlink_core::{SessionError, TelemetrySample};

use crate::forward::{self, Forwarder};

/// Lifecycle of one device connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticating,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticating => write!(f, "authenticating"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Why a relay loop ended.
#[derive(Debug)]
pub enum CloseReason {
    /// The device sent a close frame.
    PeerClosed,
    /// The stream ended without a close frame.
    Disconnected,
    /// Receiving from or sending to the device failed.
    Transport(SessionError),
    /// The device sent something that is not telemetry.
    Protocol(SessionError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "closed by device"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Transport(e) | Self::Protocol(e) => write!(f, "{e}"),
        }
    }
}

/// Where and how long to deliver reports.
#[derive(Clone)]
pub struct Forwarding {
    pub forwarder: Arc<dyn Forwarder>,
    pub timeout: Duration,
}

/// Live-session counter. Each [`Session`] holds one slot until dropped.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker(Arc<AtomicUsize>);

impl SessionTracker {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> SessionSlot {
        self.0.fetch_add(1, Ordering::SeqCst);
        SessionSlot(Arc::clone(&self.0))
    }
}

struct SessionSlot(Arc<AtomicUsize>);

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An authenticated device connection.
pub struct Session {
    sn: String,
    peer: SocketAddr,
    socket: WebSocket,
    state: SessionState,
    _slot: SessionSlot,
}

impl Session {
    pub(crate) fn new(
        sn: String,
        peer: SocketAddr,
        socket: WebSocket,
        tracker: &SessionTracker,
    ) -> Self {
        Self {
            sn,
            peer,
            socket,
            state: SessionState::Active,
            _slot: tracker.acquire(),
        }
    }

    pub fn sn(&self) -> &str {
        &self.sn
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Relay until the connection closes. Consumes the session: deliveries
    /// still in flight are awaited, then the socket and its tracker slot are
    /// released on return, whichever way the loop ended.
    pub async fn relay(mut self, forwarding: Forwarding) -> CloseReason {
        let mut deliveries = JoinSet::new();

        let reason = loop {
            let msg = match self.socket.recv().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => break CloseReason::Transport(SessionError::Transport(Box::new(e))),
                None => break CloseReason::Disconnected,
            };

            let payload: &[u8] = match &msg {
                Message::Text(text) => text.as_str().as_bytes(),
                Message::Binary(bytes) => bytes.as_ref(),
                Message::Close(_) => break CloseReason::PeerClosed,
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            log::info!("[{}] {}", self.peer, String::from_utf8_lossy(payload));

            let report = match TelemetrySample::parse(payload) {
                Ok(report) => report,
                Err(e) => {
                    self.close(close_code::INVALID, e.public_message()).await;
                    break CloseReason::Protocol(e);
                }
            };
            if report.sn != self.sn {
                log::debug!(
                    "[{}] session {} relaying report tagged {}",
                    self.peer,
                    self.sn,
                    report.sn
                );
            }

            // Reap finished deliveries so the set stays small on long sessions.
            while deliveries.try_join_next().is_some() {}
            deliveries.spawn(forward::deliver(
                Arc::clone(&forwarding.forwarder),
                report,
                forwarding.timeout,
            ));

            if let Err(e) = self.socket.send(msg).await {
                break CloseReason::Transport(SessionError::Transport(Box::new(e)));
            }
        };

        self.state = SessionState::Closed;
        // Every parsed reading gets its delivery attempt; each one is
        // already bounded by the forwarding timeout.
        while deliveries.join_next().await.is_some() {}
        log::info!(
            "[{}] session {} {}: {reason}",
            self.peer,
            self.sn,
            self.state
        );
        reason
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            log::debug!("[{}] close frame not sent: {e}", self.peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Authenticating.to_string(), "authenticating");
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_tracker_slots_release_on_drop() {
        let tracker = SessionTracker::default();
        let a = tracker.acquire();
        let b = tracker.clone().acquire();
        assert_eq!(tracker.active(), 2);
        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::PeerClosed.to_string(), "closed by device");
        let parse = TelemetrySample::parse(b"nope").unwrap_err();
        assert!(
            CloseReason::Protocol(parse)
                .to_string()
                .starts_with("malformed telemetry")
        );
    }
}
