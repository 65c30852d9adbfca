use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::screening::ScreeningError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Screening error: {0}")]
    Screening(#[from] ScreeningError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Screening(e) => {
                let (status, code) = match e {
                    ScreeningError::InvalidWeightConfig(_) => {
                        (StatusCode::BAD_REQUEST, "INVALID_WEIGHT_CONFIG")
                    }
                    ScreeningError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIG"),
                    ScreeningError::EmptyJobDescription => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_JOB_DESCRIPTION")
                    }
                    ScreeningError::Cancelled => {
                        tracing::warn!("Screening cancelled before completion");
                        (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED")
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screening_errors_map_to_client_statuses() {
        let cases = [
            (ScreeningError::InvalidWeightConfig("x".into()), StatusCode::BAD_REQUEST),
            (ScreeningError::InvalidConfig("x".into()), StatusCode::BAD_REQUEST),
            (ScreeningError::EmptyJobDescription, StatusCode::UNPROCESSABLE_ENTITY),
            (ScreeningError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret path")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
