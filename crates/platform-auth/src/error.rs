//! Error types for credential verification

use thiserror::Error;

/// Errors from credential verification against the auth service.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credential was supplied, or the auth service reported the
    /// credential as invalid or expired.
    #[error("authorization required")]
    AuthorizationRequired,

    /// The auth service response was not declared as JSON.
    #[error("auth service returned non-JSON content type: {0}")]
    WrongContentType(String),

    /// The auth service response body did not decode as the expected shape.
    #[error("auth service response could not be decoded: {0}")]
    Decode(String),

    /// Any other auth service failure: network error, timeout, or an
    /// application error other than an invalid credential.
    #[error("auth service error: {0}")]
    Upstream(String),
}

/// Result alias for verification operations.
pub type Result<T> = std::result::Result<T, AuthError>;
