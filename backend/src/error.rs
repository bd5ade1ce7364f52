use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared::constants::NOTHING_TO_SPIN_ERROR;
use shared::shared_wheel::SpinError;
use tracing::error;
use validator::ValidationErrors;

use crate::auth::AuthError;
use crate::imaging::CompressError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    Store(StoreError),
    Validation(ValidationErrors),
    Spin(SpinError),
    /// The spin animation has not finished yet.
    TooEarly { remaining_ms: u64 },
    Image(CompressError),
    Auth(AuthError),
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

impl From<SpinError> for AppError {
    fn from(err: SpinError) -> Self {
        AppError::Spin(err)
    }
}

impl From<CompressError> for AppError {
    fn from(err: CompressError) -> Self {
        AppError::Image(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

/// First message per field, fields in name order.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);
    fields
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Store(e) => {
                let status = match &e {
                    StoreError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    StoreError::QuotaExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
                    StoreError::StalePrefs(_) => StatusCode::CONFLICT,
                    StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                    StoreError::Io(_) | StoreError::Serialization(_) => {
                        error!("Store failure: {}", e);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({ "error": "Storage error" })),
                        )
                            .into_response();
                    }
                };
                (status, json!({ "error": e.to_string() }))
            }
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, json!({ "error": validation_message(&e) })),
            AppError::Spin(e) => {
                let (status, message) = match e {
                    SpinError::AlreadySpinning | SpinError::NotSpinning => (StatusCode::CONFLICT, e.to_string()),
                    SpinError::TooFewSegments(0) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, NOTHING_TO_SPIN_ERROR.to_string())
                    }
                    SpinError::TooFewSegments(_) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                };
                (status, json!({ "error": message }))
            }
            AppError::TooEarly { remaining_ms } => (
                StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT),
                json!({ "error": "The wheel is still spinning", "remaining_ms": remaining_ms }),
            ),
            AppError::Image(e) => match e {
                CompressError::TooLarge { achieved_bytes, target_bytes } => (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    json!({
                        "error": e.to_string(),
                        "achieved_bytes": achieved_bytes,
                        "target_bytes": target_bytes,
                    }),
                ),
                CompressError::Decode(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, json!({ "error": e.to_string() })),
                CompressError::Encode(_) => {
                    error!("Image encoding failed: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Image encoding failed" }))
                }
            },
            AppError::Auth(e) => return e.into_response(),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            AppError::Internal(message) => {
                error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}
