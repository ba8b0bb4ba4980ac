use super::{ApiError, AppState};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use monitor_core::services::ServiceRecord;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct ServiceAction {
    name: String,
    action: String,
}

pub(super) async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceRecord>> {
    Json(state.services.list())
}

pub(super) async fn get_service(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ServiceRecord>, ApiError> {
    let Path(name) = path?;
    Ok(Json(state.services.get(&name)?))
}

/// Accepts a lifecycle request. The effect runs in the background, so success
/// only means the transition was admitted.
pub(super) async fn service_action(
    State(state): State<AppState>,
    payload: Result<Json<ServiceAction>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("service name must not be empty".into()));
    }

    let registry = &state.services;
    match request.action.as_str() {
        "install" => registry.install(name)?,
        "start" => registry.start(name)?,
        "stop" => registry.stop(name)?,
        "reload" => registry.reload(name)?,
        "uninstall" => registry.uninstall(name)?,
        other => {
            return Err(ApiError::NotImplemented(format!(
                "unknown service action '{}'",
                other
            )))
        }
    }
    Ok(StatusCode::ACCEPTED)
}
