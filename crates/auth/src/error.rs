//! Authentication error types and HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors produced by the authentication core.
///
/// Token failures are handled inside [`AuthService::authenticate`] and collapse
/// to an anonymous result there; they surface from [`TokenCodec::verify`] for
/// callers that need the distinction (and for tests). None of the token
/// variants carry token contents, so logging them never leaks claim data.
///
/// [`AuthService::authenticate`]: crate::service::AuthService::authenticate
/// [`TokenCodec::verify`]: crate::token::TokenCodec::verify
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Key lifecycle
    #[error("key storage error: {0}")]
    KeyStorage(String),
    #[error("signing key file could not be parsed: {0}")]
    KeyCorrupt(String),

    // Token verification
    #[error("token is malformed")]
    TokenMalformed,
    #[error("token signature is invalid")]
    TokenSignatureInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error("token issuer mismatch")]
    TokenIssuerMismatch,
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),

    // Password handling
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password must be at most {0} characters")]
    PasswordTooLong(usize),
    #[error("stored password hash is not a recognized encoding")]
    CorruptHash,
    #[error("password hashing failed: {0}")]
    Hashing(String),

    // Request outcomes
    #[error("authentication required")]
    Unauthorized,
    #[error("user not found")]
    UserNotFound,

    // External user store
    #[error("user store error: {0}")]
    Store(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Token failures collapse to a generic unauthenticated response;
            // the precise reason is only ever logged at debug level.
            AuthError::TokenMalformed
            | AuthError::TokenSignatureInvalid
            | AuthError::TokenExpired
            | AuthError::TokenIssuerMismatch
            | AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),

            // A verified token pointing at a deleted/unknown user.
            AuthError::UserNotFound => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string())
            }

            // Validation failures (registration / password-change flows).
            AuthError::PasswordTooShort(_) | AuthError::PasswordTooLong(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.to_string())
            }
            AuthError::CorruptHash => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.to_string())
            }

            // Internal failures never expose detail to the caller.
            AuthError::KeyStorage(_)
            | AuthError::KeyCorrupt(_)
            | AuthError::TokenEncoding(_)
            | AuthError::Hashing(_)
            | AuthError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("User store error: {:?}", err);
        AuthError::Store(err.to_string())
    }
}

/// Result type alias for the authentication core
pub type AuthResult<T> = Result<T, AuthError>;
