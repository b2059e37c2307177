//! Device handshake: credential check, then hand-off to the relay.
//!
//! The device connects to `/devices/auth/ws?sn=<sn>&passwd=<passwd>`. A
//! mismatch gets a `{status: 0}` message and a policy-violation close, and no
//! session is created. A match gets a single `{status: 1}` acknowledgement
//! and the connection becomes a [`Session`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use serde::Deserialize;

use sensorlink_core::{AUTH_OK_MESSAGE, SessionError, StatusMessage};

use crate::AppState;
use crate::relay::{Session, SessionState};

/// Path devices connect to.
pub const DEVICE_WS_PATH: &str = "/devices/auth/ws";

/// Handshake credentials. Absent parameters never match a device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub sn: String,
    #[serde(default)]
    pub passwd: String,
}

pub(crate) async fn handle_device_ws(
    ws: WebSocketUpgrade,
    Query(credentials): Query<Credentials>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let Ok(session) = authenticate(socket, credentials, peer, &state).await else {
            return;
        };
        session.relay(state.forwarding()).await;
    })
}

/// Check `credentials` against the registry and either reject the connection
/// or turn it into an active [`Session`].
pub async fn authenticate(
    mut socket: WebSocket,
    credentials: Credentials,
    peer: SocketAddr,
    state: &AppState,
) -> Result<Session, SessionError> {
    log::info!("{DEVICE_WS_PATH} connected by {peer}");
    log::debug!("[{peer}] {}", SessionState::Authenticating);

    let Some(device) = state.registry.lookup(&credentials.sn, &credentials.passwd) else {
        let err = SessionError::Auth {
            sn: credentials.sn,
        };
        log::info!("[{peer}] {err}, closing");
        reject(&mut socket, err.public_message()).await;
        return Err(err);
    };

    let ack = StatusMessage::ok(AUTH_OK_MESSAGE).to_json()?;
    if let Err(e) = socket.send(Message::Text(ack.into())).await {
        log::info!("[{peer}] acknowledgement not delivered: {e}");
        return Err(SessionError::Transport(Box::new(e)));
    }

    log::info!("[{peer}] device {} authenticated", device.sn);
    Ok(Session::new(device.sn, peer, socket, &state.sessions))
}

async fn reject(socket: &mut WebSocket, message: &str) {
    match StatusMessage::failed(message).to_json() {
        Ok(status) => {
            if let Err(e) = socket.send(Message::Text(status.into())).await {
                log::debug!("failure status not sent: {e}");
                return;
            }
        }
        Err(e) => log::warn!("failure status not encoded: {e}"),
    }
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: message.to_owned().into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        log::debug!("close frame not sent: {e}");
    }
}
