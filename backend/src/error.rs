use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorResponse, RunId, TransitionError};

use crate::history::HistoryError;
use crate::preprocess::PreprocessError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InputRejected(#[from] PreprocessError),
    #[error("Classification unavailable for run {run_id}: {reason}")]
    ClassificationUnavailable { run_id: RunId, reason: String },
    #[error("{0}")]
    Transition(#[from] TransitionError),
    #[error("Run {0} not found")]
    RunNotFound(RunId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("History unavailable: {0}")]
    History(#[from] HistoryError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn retryable(&self) -> bool {
        matches!(self, ApiError::ClassificationUnavailable { .. })
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InputRejected(PreprocessError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::InputRejected(PreprocessError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InputRejected(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ClassificationUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Transition(_) => StatusCode::CONFLICT,
            ApiError::RunNotFound(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::History(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            ApiError::ClassificationUnavailable { .. } => {
                "Failed to analyze image. Please try again.".to_string()
            }
            ApiError::History(e) => {
                log::error!("History request failed: {}", e);
                "Detection history is temporarily unavailable".to_string()
            }
            ApiError::Internal(detail) => {
                log::error!("Internal error: {}", detail);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error,
            retryable: self.retryable(),
        })
    }
}
