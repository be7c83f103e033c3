//! Unified API error handling
//!
//! Provides consistent error responses across all endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::tendering::TenderError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Tender(#[from] TenderError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Tender(e) => match e {
                TenderError::Validation { .. } | TenderError::MissingDate => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                TenderError::NotFound { .. } => StatusCode::NOT_FOUND,
                TenderError::InvalidTransition { .. }
                | TenderError::AlreadyPaid
                | TenderError::NotPaid
                | TenderError::AlreadyReturned
                | TenderError::NotReturned
                | TenderError::NotWon { .. }
                | TenderError::AlreadyConverted { .. }
                | TenderError::Conflict { .. }
                | TenderError::ImmutableField { .. } => StatusCode::CONFLICT,
                TenderError::SiteCreation(_) | TenderError::Upload(_) => StatusCode::BAD_GATEWAY,
                TenderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Tender(e) => e.code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Tender(TenderError::Store(_)) => "An internal error occurred".to_string(),
            Self::Tender(TenderError::Upload(_)) => "The file could not be stored".to_string(),
            Self::Tender(e) => e.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Tender(TenderError::Validation { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            Self::Tender(TenderError::InvalidTransition { from, op }) => {
                Some(serde_json::json!({ "from": from, "operation": op }))
            }
            Self::Tender(TenderError::AlreadyConverted { site_id }) => {
                Some(serde_json::json!({ "site_id": site_id }))
            }
            Self::Tender(TenderError::Conflict { actual, .. }) => {
                Some(serde_json::json!({ "current_version": actual }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log internal errors
        match &self {
            Self::Tender(TenderError::Store(e)) => {
                tracing::error!(error = %e, "Store error");
            }
            Self::Tender(TenderError::Upload(e)) => {
                tracing::error!(error = %e, "Upload storage error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TenderOperation, TenderStatus};
    use uuid::Uuid;

    #[test]
    fn tender_errors_map_to_http_statuses() {
        let cases = [
            (TenderError::validation("reason", "empty"), StatusCode::UNPROCESSABLE_ENTITY),
            (TenderError::MissingDate, StatusCode::UNPROCESSABLE_ENTITY),
            (TenderError::tender_not_found(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (
                TenderError::InvalidTransition {
                    from: TenderStatus::Lost,
                    op: TenderOperation::MarkWon,
                },
                StatusCode::CONFLICT,
            ),
            (TenderError::AlreadyReturned, StatusCode::CONFLICT),
            (TenderError::SiteCreation("down".into()), StatusCode::BAD_GATEWAY),
            (TenderError::Store("pool".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn store_errors_are_not_leaked() {
        let err = ApiError::from(TenderError::Store("password authentication failed".into()));
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn upload_failures_hide_storage_paths() {
        let err = ApiError::from(TenderError::Upload(
            "Failed to write /srv/tenderdesk/uploads/3f2a-gst.pdf: No space left on device".into(),
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "UPLOAD_FAILED");
        assert_eq!(err.public_message(), "The file could not be stored");
    }

    #[test]
    fn already_converted_exposes_site_id() {
        let site_id = Uuid::new_v4();
        let err = ApiError::from(TenderError::AlreadyConverted { site_id });
        assert_eq!(
            err.details(),
            Some(serde_json::json!({ "site_id": site_id }))
        );
    }
}
