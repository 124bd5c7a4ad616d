use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};
use zipsync_storage::StorageError;

use crate::reconcile::ReconcileError;
use crate::table::TableError;

/// Errors surfaced by the HTTP handlers. Every variant renders as
/// `{"error": <message>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Multipart form error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("file not provided in multipart form data")]
    MissingFile,

    #[error("{0}")]
    Table(#[from] TableError),

    #[error("{0}")]
    Reconcile(#[from] ReconcileError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownEntity(_) => StatusCode::NOT_FOUND,
            Self::Multipart(_) | Self::MissingFile | Self::Table(_) | Self::Reconcile(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match &self {
            Self::Storage(e) => error!(category = %e.category(), error = %message, "store failure"),
            Self::Unavailable(_) => error!(error = %message, "store unavailable"),
            _ => warn!(status = status.as_u16(), error = %message, "request rejected"),
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(ApiError::UnknownEntity("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Reconcile(ReconcileError::MissingColumn("Zip".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Storage(StorageError::connection_error("down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::from(ReconcileError::IncompleteRow {
            key_field: "Zip".into(),
            key: "10001".into(),
        });
        assert_eq!(err.to_string(), "Row with Zip 10001 contains 'N/A' value");
    }
}
