use super::{ApiError, AppState};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use monitor_core::tasks::{TaskId, TaskRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct NewTask {
    description: String,
    /// Defaults to the submission time when omitted.
    #[serde(default)]
    run_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TaskIdQuery {
    id: Option<String>,
}

pub(super) async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskRecord>> {
    Json(state.tasks.list())
}

pub(super) async fn get_task(
    State(state): State<AppState>,
    path: Result<Path<TaskId>, PathRejection>,
) -> Result<Json<TaskRecord>, ApiError> {
    let Path(id) = path?;
    Ok(Json(state.tasks.get(id)?))
}

pub(super) async fn submit_task(
    State(state): State<AppState>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let run_time = request.run_time.unwrap_or_else(Utc::now);
    let record = state.tasks.submit(request.description, run_time);
    Ok((StatusCode::CREATED, Json(record)))
}

pub(super) async fn delete_task(
    State(state): State<AppState>,
    path: Result<Path<TaskId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path?;
    state.tasks.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/tasks?id=N`, kept for dashboards that pass the id as a query.
pub(super) async fn delete_task_by_query(
    State(state): State<AppState>,
    query: Result<Query<TaskIdQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(query) = query?;
    let raw = query
        .id
        .ok_or_else(|| ApiError::BadRequest("missing task id".into()))?;
    let id: TaskId = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid task id '{}'", raw)))?;
    state.tasks.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}
