//! Error handling for the HTTP API.
//!
//! Handlers return [`ApiResult`] and use `?`; each variant maps to a status
//! code and a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::api::{CalendarFailureResponse, ErrorResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The task store answered but refused the operation
    #[error("{error}")]
    Upstream { error: String, details: Option<String> },

    /// A store call failed outright
    #[error("{error}: {details}")]
    Store { error: String, details: String },

    /// The calendar run could not produce a response
    #[error("Calendar run failed: {0}")]
    Calendar(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(msg))).into_response()
            }
            ApiError::Upstream { error, details } => {
                tracing::warn!(error = %error, "Upstream refused request");
                let body = ErrorResponse { error, details };
                (StatusCode::BAD_GATEWAY, Json(body)).into_response()
            }
            ApiError::Store { error, details } => {
                tracing::error!(error = %error, details = %details, "Store call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::with_details(error, details)),
                )
                    .into_response()
            }
            ApiError::Calendar(details) => {
                tracing::error!("Calendar run failed: {}", details);
                let body = CalendarFailureResponse {
                    error: "Internal Server Error".to_string(),
                    details,
                    events: vec![],
                    tasks: vec![],
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
