use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use campustalk_types::api::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

/// Hint sent with retryable failures.
const RETRY_AFTER_SECS: &str = "1";

/// Every failure the messaging API can report.
///
/// Display strings are what clients see, so none of them carry internal
/// detail. Credential failures in particular never say which field was wrong.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("username already exists")]
    AlreadyExists,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("missing, invalid or expired session")]
    Unauthenticated,

    #[error("unknown participant")]
    InvalidParticipant,

    #[error("message body must not be empty")]
    EmptyBody,

    #[error("{0}")]
    Validation(String),

    #[error("user not found")]
    NotFound,

    /// Storage was unreachable, failed or timed out. A write that timed out
    /// may still have been applied, so clients should re-read before
    /// retrying one.
    #[error("storage temporarily unavailable; the request may or may not have been applied")]
    TransientStore(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AlreadyExists => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidParticipant | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EmptyBody | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code for the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AlreadyExists => "already_exists",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::InvalidParticipant => "invalid_participant",
            ApiError::EmptyBody => "empty_body",
            ApiError::Validation(_) => "validation",
            ApiError::NotFound => "not_found",
            ApiError::TransientStore(_) => "transient_store_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TransientStore(_))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError::Validation("malformed request body".into())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        ApiError::Validation("malformed query string".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::TransientStore(cause) = &self {
            error!("Storage failure: {:#}", cause);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        let mut response = (self.status_code(), Json(body)).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
