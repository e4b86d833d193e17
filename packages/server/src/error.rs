//! API error type and its HTTP mapping.
//!
//! Every handler returns `Result<HttpResponse, ApiError>`. Errors render as
//! `{"error": "<message>"}`; internal failures are logged and replaced with
//! a generic message.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use bus_directory_bus_models::SubmissionError;
use bus_directory_database::DbError;
use bus_directory_search::SearchError;
use bus_directory_uploads::UploadError;
use bus_directory_votes::VoteError;

/// Message returned for any internal failure.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Message returned when a bus doesn't exist.
pub const BUS_NOT_FOUND: &str = "Bus not found";

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400: the request was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// 401: no valid caller identity.
    #[error("{0}")]
    Unauthenticated(String),

    /// 404: the resource doesn't exist.
    #[error("{0}")]
    NotFound(String),

    /// 409: the resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// 503: an optional feature isn't configured.
    #[error("{0}")]
    Unavailable(String),

    /// 500: something failed server-side. The detail is logged, not
    /// returned.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Logs `detail` and returns a generic internal error.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        log::error!("{detail}");
        Self::Internal(INTERNAL_MESSAGE.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { .. } => Self::NotFound(BUS_NOT_FOUND.to_string()),
            DbError::AlreadyExists { .. } => {
                Self::Conflict("Bus with this license number already exists".to_string())
            }
            DbError::InvalidPatch(e) => Self::BadRequest(e.to_string()),
            other => Self::internal(other),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(e: SubmissionError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::BadRequest { message } => Self::BadRequest(message),
            SearchError::Store(e) => Self::from(e),
        }
    }
}

impl From<VoteError> for ApiError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::NotFound { .. } => Self::NotFound(BUS_NOT_FOUND.to_string()),
            VoteError::Unauthenticated => Self::Unauthenticated(e.to_string()),
            VoteError::Store(e) => Self::from(e),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::InvalidRequest { message } => Self::BadRequest(message),
            other => Self::internal(other),
        }
    }
}
