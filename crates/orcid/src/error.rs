//! Error types for ORCID OAuth operations
//!
//! Malformed upstream bodies get distinct kinds (wrong content type, empty
//! body, undecodable JSON) so operators can tell an ORCID outage from a
//! changed response shape.

use crate::types::OAuthErrorCode;

/// Errors from ORCID OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure: connect error, timeout, broken transfer.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The response body was not declared as JSON.
    #[error("upstream returned non-JSON content type: {0}")]
    WrongContentType(String),

    /// The response carried no body at all.
    #[error("upstream returned an empty body")]
    EmptyBody,

    /// The body was present but did not decode as the expected shape.
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),

    /// A well-formed OAuth error response from the token endpoint.
    #[error("OAuth error {}: {}", .code.as_str(), .description.as_deref().unwrap_or("(no description)"))]
    OAuth {
        code: OAuthErrorCode,
        description: Option<String>,
    },
}

/// Result alias for ORCID OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
