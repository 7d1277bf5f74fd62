use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

use crate::store::StoreError;
use crate::sync::MalformedEvent;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = Json(ErrorResponse {
            status: "error",
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UserNotFound(_) | StoreError::ConferenceNotFound(_) => {
                AppError::not_found(value.to_string())
            }
            StoreError::DuplicatePhone(_) | StoreError::DuplicateUser(_) => {
                AppError::new(StatusCode::CONFLICT, value.to_string())
            }
            _ => AppError::internal(value),
        }
    }
}

/// Malformed webhooks are answered as server errors; retrying is up to the sender.
impl From<MalformedEvent> for AppError {
    fn from(value: MalformedEvent) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::UserNotFound(7), StatusCode::NOT_FOUND),
            (
                StoreError::DuplicatePhone("+380501234567".into()),
                StatusCode::CONFLICT,
            ),
            (
                StoreError::Pool("timed out".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).into_response().status(), status);
        }
        let malformed = AppError::from(MalformedEvent("missing event name".into()));
        assert_eq!(
            malformed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
