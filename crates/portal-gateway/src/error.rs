use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portal_core::ShortenerError;
use portal_redirector::RedirectorError;
use thiserror::Error;
use tonic::{Code, Status};
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the transports.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error(transparent)]
    Redirector(#[from] RedirectorError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Transport-independent classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    InvalidArgument,
    Unauthorized,
    NotFound,
    Deleted,
    Conflict,
    Internal,
}

impl AppError {
    fn kind(&self) -> Kind {
        match self {
            AppError::Shortener(e) => match e {
                ShortenerError::InvalidUrl(_)
                | ShortenerError::UnsupportedScheme(_)
                | ShortenerError::InvalidShortCode(_)
                | ShortenerError::EmptyBatch => Kind::InvalidArgument,
                ShortenerError::Unauthorized => Kind::Unauthorized,
                ShortenerError::Conflict { .. } => Kind::Conflict,
                ShortenerError::GiveUp { .. }
                | ShortenerError::Closed
                | ShortenerError::Storage(_) => Kind::Internal,
            },
            AppError::Redirector(e) => match e {
                RedirectorError::InvalidPath(_) => Kind::InvalidArgument,
                RedirectorError::NotFound(_) => Kind::NotFound,
                RedirectorError::Deleted(_) => Kind::Deleted,
                RedirectorError::Storage(_) => Kind::Internal,
            },
            AppError::InvalidRequest(_) => Kind::InvalidArgument,
            AppError::Internal(_) => Kind::Internal,
        }
    }

    /// Message safe to hand to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Shortener(ShortenerError::Conflict { short_url }) => short_url.clone(),
            other if other.kind() == Kind::Internal => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            Kind::InvalidArgument => StatusCode::BAD_REQUEST,
            Kind::Unauthorized => StatusCode::UNAUTHORIZED,
            Kind::NotFound => StatusCode::NOT_FOUND,
            Kind::Deleted => StatusCode::GONE,
            Kind::Conflict => StatusCode::CONFLICT,
            Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, self.public_message()).into_response()
    }
}

impl From<AppError> for Status {
    fn from(error: AppError) -> Self {
        let code = match error.kind() {
            Kind::InvalidArgument => Code::InvalidArgument,
            Kind::Unauthorized => Code::Unauthenticated,
            Kind::NotFound => Code::NotFound,
            Kind::Deleted | Kind::Conflict => Code::FailedPrecondition,
            Kind::Internal => {
                error!(error = %error, "gRPC call failed");
                Code::Internal
            }
        };
        Status::new(code, error.public_message())
    }
}
