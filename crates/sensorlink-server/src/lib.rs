//! WebSocket device gateway.
//!
//! Devices authenticate with a serial number and shared secret, then stream
//! telemetry. Each reading is echoed back to the device and forwarded,
//! best-effort, to a downstream HTTP consumer. The registry behind the
//! handshake is also exposed as a small CRUD API under `/devices`.

pub mod config;
pub mod devices;
pub mod forward;
pub mod gateway;
pub mod relay;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::Json,
    routing::get,
};
use serde::Serialize;
use thiserror::Error;

use sensorlink_core::{ConfigError, DeviceRegistry, MemoryRegistry, RegistryError};

pub use config::ServerConfig;
pub use forward::{DiscardForwarder, ForwardError, Forwarder, HttpForwarder};
pub use gateway::{Credentials, DEVICE_WS_PATH};
pub use relay::{CloseReason, Forwarding, Session, SessionState, SessionTracker};

/// Startup failures of the gateway process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Collaborators shared by every session.
pub struct AppState {
    registry: Arc<dyn DeviceRegistry>,
    forwarder: Arc<dyn Forwarder>,
    forward_timeout: Duration,
    sessions: SessionTracker,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        forwarder: Arc<dyn Forwarder>,
        forward_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            forwarder,
            forward_timeout,
            sessions: SessionTracker::default(),
        }
    }

    /// Build the registry and forwarder described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let registry = match &config.registry.devices {
            Some(path) => MemoryRegistry::load(path)?,
            None => {
                log::warn!("no device list configured, registry starts empty");
                MemoryRegistry::new()
            }
        };
        let timeout = config.downstream.timeout();
        let forwarder: Arc<dyn Forwarder> = match &config.downstream.callback_url {
            Some(url) => Arc::new(HttpForwarder::new(url.clone(), timeout)),
            None => Arc::new(DiscardForwarder),
        };
        Ok(Self::new(Arc::new(registry), forwarder, timeout))
    }

    pub fn registry(&self) -> &Arc<dyn DeviceRegistry> {
        &self.registry
    }

    /// Sessions currently past the handshake and not yet closed.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    pub fn forwarding(&self) -> Forwarding {
        Forwarding {
            forwarder: Arc::clone(&self.forwarder),
            timeout: self.forward_timeout,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    devices: usize,
    sessions: usize,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        devices: state.registry.len(),
        sessions: state.active_sessions(),
    })
}

async fn handle_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "sensorlink gateway",
        "version": sensorlink_core::VERSION,
        "endpoints": {
            "/": "This API index",
            DEVICE_WS_PATH: "WebSocket telemetry stream (query: sn, passwd)",
            "/devices": {
                "GET": "List devices (query: ids=a,b)",
                "POST": "Register devices: [{name, type, sn, passwd}]",
                "PUT": "Update devices: [{id, name, type, sn, passwd}]",
                "DELETE": "Remove devices: {ids: [..]}",
            },
            "/health": "Health check",
        },
    }))
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route(DEVICE_WS_PATH, get(gateway::handle_device_ws))
        .route(
            "/devices",
            get(devices::handle_list)
                .post(devices::handle_add)
                .put(devices::handle_update)
                .delete(devices::handle_delete),
        )
        .with_state(state)
}

/// Serve on an already-bound listener until the future `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the gateway described by `config` until Ctrl+C.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let state = Arc::new(AppState::from_config(&config)?);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    log::info!("listening on {addr}");
    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("shutting down");
    })
    .await
    .map_err(ServerError::Serve)
}
