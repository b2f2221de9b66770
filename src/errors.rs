use crate::services::storage_service::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Serialized as `{"detail": <message>, "status": <code>}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        }

        let body = Json(json!({
            "detail": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::MissingFile
            | StorageError::MissingFilename
            | StorageError::InvalidType
            | StorageError::TooLarge { .. }
            | StorageError::Empty
            | StorageError::MalformedUpload(_) => AppError::bad_request(message),
            StorageError::Expired | StorageError::NotFound => AppError::not_found(message),
            StorageError::Save(_)
            | StorageError::Delete(_)
            | StorageError::Qr(_)
            | StorageError::Io(_) => AppError::internal(message),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_errors_map_to_status_codes() {
        let cases = [
            (StorageError::InvalidType, StatusCode::BAD_REQUEST),
            (StorageError::Empty, StatusCode::BAD_REQUEST),
            (StorageError::TooLarge { limit: 1 }, StatusCode::BAD_REQUEST),
            (StorageError::Expired, StatusCode::NOT_FOUND),
            (StorageError::NotFound, StatusCode::NOT_FOUND),
            (
                StorageError::Save(io::Error::new(io::ErrorKind::Other, "disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn server_errors_surface_the_cause() {
        let err = StorageError::Delete(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        assert_eq!(AppError::from(err).message, "Failed to delete file: read-only");
    }
}
