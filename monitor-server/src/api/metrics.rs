use super::{ApiError, AppState};
use axum::{extract::State, response::IntoResponse, Json};

/// Serves the last published snapshot. Never triggers a collection.
pub(super) async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.read() {
        Some(snapshot) => Json(&*snapshot).into_response(),
        None => ApiError::Unavailable("metrics not collected yet").into_response(),
    }
}
