use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tavern_collab::{AuthError, CollabError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Missing authorization")]
    MissingAuthorization,
    #[error("Authorization must be Bearer")]
    MalformedAuthorization,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("This connection was replaced by a newer one")]
    Superseded,
    #[error(transparent)]
    Collab(#[from] CollabError),
    #[error("Port must be a number, got {0}")]
    InvalidPort(String),
    #[error("Server failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuthorization | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::MalformedAuthorization
            | Self::MalformedMessage(_)
            | Self::UnknownEvent(_)
            | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Superseded => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Missing => Self::MissingAuthorization,
            AuthError::InvalidToken => Self::InvalidToken,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedMessage(value.to_string())
    }
}
