use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::Notice;

/// BackendError
///
/// Failure modes of a call to the session backend. The gate treats all of
/// them as "not authenticated"; the variants exist for logging.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("session backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session backend unavailable: {0}")]
    Unavailable(String),

    #[error("session backend rejected the request (status {status}): {message}")]
    Rejected { status: i64, message: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_) | BackendError::Unavailable(_)
        )
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'a Notice>,
}

/// ApiError
///
/// Errors returned by the JSON API. Rendered as `{status, message, notice?}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated(Notice),

    #[error("{}", .0.message)]
    LoginRejected(Notice),

    #[error("session backend unavailable")]
    BackendUnavailable(Notice),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, notice) = match &self {
            ApiError::Unauthenticated(n) => (StatusCode::UNAUTHORIZED, Some(n)),
            ApiError::LoginRejected(n) => (StatusCode::UNAUTHORIZED, Some(n)),
            ApiError::BackendUnavailable(n) => (StatusCode::BAD_GATEWAY, Some(n)),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
        };
        let message = self.to_string();
        let body = ErrorBody {
            status: status.as_u16(),
            message: &message,
            notice,
        };
        (status, Json(body)).into_response()
    }
}
