use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use gateway::{ErrorKind, Rejection, ResponseEnvelope};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", .0.error)]
    Gateway(Rejection),
    #[error("Invalid query string: {0}")]
    InvalidQuery(#[from] QueryRejection),
    #[error("Route {method} {path} not found")]
    NotFound { method: Method, path: String },
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Gateway(rejection)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Connection | ErrorKind::Execution => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Gateway(rejection) => {
                let kind = rejection.kind();
                match kind {
                    ErrorKind::Connection => {
                        tracing::error!(error = %rejection.error, "Database connection error.");
                    }
                    ErrorKind::Execution => {
                        tracing::warn!(error = %rejection.error, "Query execution failed.");
                    }
                    ErrorKind::Validation | ErrorKind::Forbidden => {}
                }
                (status_for(kind), Json(rejection.envelope)).into_response()
            }
            AppError::InvalidQuery(rejection) => {
                let envelope =
                    ResponseEnvelope::failure("Invalid query string", Some(rejection.body_text()));
                (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
            }
            AppError::NotFound { method, path } => {
                let body = Json(json!({
                    "error": "Not Found",
                    "message": format!("Route {method} {path} not found"),
                    "timestamp": gateway::envelope::timestamp(),
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
        }
    }
}
