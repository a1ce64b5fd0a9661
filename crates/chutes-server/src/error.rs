//! The server-level error type.
//!
//! [`ApiError`] pairs a wire [`ErrorCode`] with a client-safe message
//! and converts into both an HTTP response (for the REST and poll
//! surfaces) and a [`ServerEvent::Error`] frame (for the push socket).
//! Internal detail never leaks: unexpected failures surface as
//! `INTERNAL_ERROR` with a generic message and are logged instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chutes_core::SessionError;
use chutes_types::{ErrorCode, ServerEvent};

/// A failed request, in transport-neutral form.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Machine-readable failure code.
    pub code: ErrorCode,
    /// Client-safe description.
    pub message: String,
}

impl ApiError {
    /// Build an error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The session the client named (or is bound to) does not exist.
    pub fn game_not_found() -> Self {
        Self::new(ErrorCode::GameNotFound, "Game not found")
    }

    /// The push/pull event form of this error.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::error(self.code, self.message.clone())
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::GameNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidMessage => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::GameFull
            | ErrorCode::GameAlreadyStarted
            | ErrorCode::GameNotStarted
            | ErrorCode::NotGameCreator
            | ErrorCode::PlayerNotFound
            | ErrorCode::NotYourTurn => StatusCode::CONFLICT,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, axum::Json(self.to_event())).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_codes() {
        let err: ApiError = SessionError::GameFull.into();
        assert_eq!(err.code, ErrorCode::GameFull);
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = SessionError::InvalidName.into();
        assert_eq!(err.code, ErrorCode::InvalidMessage);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_event_carries_code_and_message() {
        let err = ApiError::game_not_found();
        let json = serde_json::to_value(err.to_event()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "GAME_NOT_FOUND");
    }
}
