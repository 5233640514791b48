//! Unified error handling with Sentry integration.
//!
//! Every handler and middleware returns `Result<T, AppError>`. Server-side
//! failures are captured to Sentry and logged before a generic body goes
//! out; client errors carry a JSON `{"error": ...}` envelope.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;

use paperback_core::ValidationErrors;

use crate::db::RepositoryError;
use crate::services::accounts::AccountError;
use crate::services::tokens::TokenError;

/// Where anonymous callers are sent.
pub const LOGIN_PATH: &str = "/user/login";

#[derive(Debug, Error)]
pub enum AppError {
    /// One or more fields failed validation.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Malformed request that is not a field problem.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No authenticated user on this session.
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid authentication credentials")]
    InvalidCredentials,

    #[error("Account not activated")]
    NotActivated,

    #[error("Permission denied")]
    NotPermitted,

    #[error("Not found")]
    NotFound,

    #[error("Edit conflict")]
    EditConflict,

    #[error("Repository error: {0}")]
    Repository(#[source] RepositoryError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::SEE_OTHER,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotActivated | Self::NotPermitted => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::Repository(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::Session(_) | Self::Internal(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Internal details never reach the client
        let body = match self {
            Self::Unauthenticated => return Redirect::to(LOGIN_PATH).into_response(),
            Self::Validation(errors) => json!({ "error": errors }),
            Self::BadRequest(message) => json!({ "error": message }),
            Self::InvalidCredentials => json!({ "error": "invalid authentication credentials" }),
            Self::NotActivated => json!({
                "error": "your user account must be activated to access this resource"
            }),
            Self::NotPermitted => json!({
                "error": "your user account doesn't have the necessary permissions to access this resource"
            }),
            Self::NotFound => json!({ "error": "the requested resource could not be found" }),
            Self::EditConflict => json!({
                "error": "unable to update the record due to an edit conflict, please try again"
            }),
            Self::Repository(_) | Self::Session(_) | Self::Internal(_) => json!({
                "error": "the server encountered a problem and could not process your request"
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::EditConflict => Self::EditConflict,
            RepositoryError::Duplicate { field } => Self::Validation(ValidationErrors::single(
                field,
                "a record with this value already exists",
            )),
            RepositoryError::MissingReference { field } => {
                Self::Validation(ValidationErrors::single(field, "does not exist"))
            }
            other => Self::Repository(other),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Repository(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => Self::Validation(errors),
            AccountError::InvalidCredentials => Self::InvalidCredentials,
            AccountError::Repository(e) => e.into(),
            AccountError::Token(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate subsequent Sentry events with a user.
pub fn set_sentry_user(user: &paperback_core::User) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            ..Default::default()
        }));
    });
}
