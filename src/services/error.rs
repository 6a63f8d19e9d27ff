//! Error handling utilities for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// Request-level failure rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = if e.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, e.to_string())
    }
}

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and map it to its natural status
    fn log_api(self, context: &str) -> Result<T, ApiError>;
}

impl<T> LogErr<T> for Result<T, Error> {
    fn log_api(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            if e.is_client_error() {
                tracing::warn!("{}: {}", context, e);
            } else {
                tracing::error!("{}: {}", context, e);
            }
            ApiError::from(e)
        })
    }
}

impl<T> LogErr<T> for Result<T, axum::extract::multipart::MultipartError> {
    fn log_api(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::warn!("{}: {}", context, e);
            ApiError::new(e.status(), e.body_text())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_unprocessable() {
        let api = ApiError::from(Error::Decode("no video stream".into()));
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.message, "unable to decode video: no video stream");
    }

    #[test]
    fn other_errors_are_internal() {
        let api = ApiError::from(Error::Encode("boom".into()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn log_api_keeps_the_natural_status() {
        let result: Result<(), Error> = Err(Error::Decode("x".into()));
        let api = result.log_api("ctx").unwrap_err();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);

        let result: Result<(), Error> = Err(Error::Encode("x".into()));
        let api = result.log_api("ctx").unwrap_err();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
