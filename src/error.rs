//! Error taxonomy shared by the coordinator and the HTTP layer.
//!
//! Every variant maps to one status code and a short JSON `message`. Internal
//! failures are logged server-side and never echoed to the client.

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing, malformed or unverifiable bearer credential.
    #[error("unauthorized access")]
    Authentication,

    /// Authenticated, but not the owner of the resource.
    #[error("forbidden access")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal server error")]
    Internal(#[source] anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::Conflict(message) => Self::Conflict(message.to_string()),
            StoreError::Database(err) => Self::Internal(err.into()),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Self::Internal(source) = &self {
            error!(status = %status, error = ?source, "Internal server error");
        }

        let body = ErrorBody {
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
