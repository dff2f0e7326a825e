use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::card_issuer::{CardIssuanceError, ErrorKind};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Issuance(#[from] CardIssuanceError),

    #[error("Missing or malformed Authorization header")]
    MissingCredential,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Issuance(e) => match e.kind() {
                ErrorKind::NotFound => "NOT_FOUND",
                ErrorKind::Unauthenticated => "UNAUTHENTICATED",
                ErrorKind::Unauthorized => "UNAUTHORIZED",
                ErrorKind::LimitExceeded => "LIMIT_EXCEEDED",
                ErrorKind::InvalidLimit => "INVALID_LIMIT",
                ErrorKind::StateConflict => "STATE_CONFLICT",
                ErrorKind::UnsupportedBrand => "UNSUPPORTED_BRAND",
                ErrorKind::InvalidInput => "INVALID_INPUT",
                ErrorKind::Unavailable => "UPSTREAM_UNAVAILABLE",
                ErrorKind::Internal => "INTERNAL",
            },
            AppError::MissingCredential => "UNAUTHENTICATED",
            AppError::Validation(_) => "INVALID_INPUT",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Issuance(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
                ErrorKind::LimitExceeded | ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::InvalidLimit
                | ErrorKind::UnsupportedBrand
                | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::MissingCredential => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
