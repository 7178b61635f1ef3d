//! Error type for the peer HTTP API.

use thiserror::Error;

/// Errors that can occur while handling a peer HTTP request. Each variant
/// carries enough information for [`crate::router`] to map it to the
/// right status code.
#[derive(Debug, Error)]
pub enum NetError {
    /// The requested change set or asset does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The submitted change set or asset failed to decode or validate.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller's verified peer role is not allowed to perform this
    /// request.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// A ledger-level failure surfaced while handling the request.
    #[error("ledger error: {0}")]
    Ledger(#[from] ows_ledger::LedgerError),
}

impl NetError {
    /// The HTTP status this error maps to, per spec.md's error-kind table.
    #[must_use]
    pub const fn status(&self) -> axum::http::StatusCode {
        match self {
            Self::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            Self::Forbidden(_) => axum::http::StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Ledger(_) => axum::http::StatusCode::BAD_REQUEST,
        }
    }
}

impl axum::response::IntoResponse for NetError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}
