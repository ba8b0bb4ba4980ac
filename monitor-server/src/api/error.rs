use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use monitor_core::RegistryError;

/// Failure of a request, rendered as `{"status": "ERROR", "msg": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    BadRequest(String),
    /// The requested service action does not exist.
    NotImplemented(String),
    /// No metrics snapshot has been published yet.
    Unavailable(&'static str),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Registry(RegistryError::AlreadyExists { .. })
            | ApiError::Registry(RegistryError::InvalidState { .. }) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Registry(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::NotImplemented(msg) => msg.clone(),
            ApiError::Unavailable(msg) => msg.to_string(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

// Extractor failures are client errors; keep them in the same JSON shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({"status": "ERROR", "msg": self.message()}));
        (status, body).into_response()
    }
}
