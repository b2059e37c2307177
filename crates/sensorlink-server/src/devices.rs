//! `/devices` CRUD routes over the registry.
//!
//! Every response uses the `{status, message, data?}` envelope. Failure
//! messages are fixed strings; the underlying error goes to the log.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use sensorlink_core::{Device, NewDevice, RegistryError};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Self {
        Self {
            status: 1,
            message: message.to_string(),
            data: Some(data),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            status: 0,
            message: message.to_string(),
            data: None,
        }
    }
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

trait JsonWithStatus<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>);
}

impl<T> JsonWithStatus<T> for Json<T> {
    fn with_status(self, status: StatusCode) -> (StatusCode, Json<T>) {
        (status, self)
    }
}

fn bad_body<T>(rejection: JsonRejection) -> Reply<T> {
    log::info!("rejected /devices request body: {rejection}");
    Json(ApiResponse::failed("invalid request body")).with_status(StatusCode::BAD_REQUEST)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    /// Comma-separated device ids.
    ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteRequest {
    ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Count {
    pub count: usize,
}

pub(crate) async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Reply<Vec<Device>> {
    let ids: Vec<String> = params
        .ids
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let devices = state.registry.list(&ids);
    Json(ApiResponse::ok("devices listed", devices)).with_status(StatusCode::OK)
}

pub(crate) async fn handle_add(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<NewDevice>>, JsonRejection>,
) -> Reply<Vec<Device>> {
    let Json(devices) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let added = state.registry.add(devices);
    log::info!("registered {} device(s)", added.len());
    Json(ApiResponse::ok("devices added", added)).with_status(StatusCode::OK)
}

pub(crate) async fn handle_update(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<Device>>, JsonRejection>,
) -> Reply<Count> {
    let Json(devices) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    match state.registry.update(devices) {
        Ok(count) => {
            log::info!("updated {count} device(s)");
            Json(ApiResponse::ok("devices updated", Count { count })).with_status(StatusCode::OK)
        }
        Err(e) => {
            log::info!("device update refused: {e}");
            let (status, message) = match e {
                RegistryError::MissingId => (StatusCode::BAD_REQUEST, "device id is required"),
                RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, "device not found"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "device update failed"),
            };
            Json(ApiResponse::failed(message)).with_status(status)
        }
    }
}

pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Reply<Count> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let count = state.registry.delete(&request.ids);
    log::info!("deleted {count} device(s)");
    Json(ApiResponse::ok("devices deleted", Count { count })).with_status(StatusCode::OK)
}
