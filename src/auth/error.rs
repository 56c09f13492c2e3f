use axum::http::StatusCode;
use thiserror::Error;

/// Failure taxonomy for the credential subsystem.
///
/// `InvalidCredentials` is the only variant end users see on the login path;
/// the operational variants carry detail for logs and operator tooling.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately carries no detail so
    /// callers cannot tell the two apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Reset target does not exist.
    #[error("no principal with that email")]
    NotFound,

    /// Stored digest is absent or not a recognized hash format.
    #[error("stored digest is unusable")]
    MalformedDigest,

    /// Backing store could not be reached or failed mid-query.
    #[error("credential storage unavailable")]
    Storage(#[source] sqlx::Error),

    /// Digest computation failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl AuthError {
    /// HTTP status this error maps to at the route boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            // Digest problems surface as a plain auth failure.
            AuthError::MalformedDigest => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::MalformedDigest => "Invalid credentials",
            AuthError::NotFound => "Principal not found",
            AuthError::Storage(_) => "Service temporarily unavailable",
            AuthError::Hash(_) => "Internal error",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Storage(e)
    }
}
