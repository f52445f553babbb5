//! Link service error taxonomy
//!
//! Every component failure is one of these kinds, each with a stable
//! numeric code surfaced to API callers. Upstream client errors convert
//! into the taxonomy here, exactly once; the HTTP edge only maps kinds to
//! status codes and response bodies.

use thiserror::Error;

/// Errors surfaced by linking-session and link operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The user already has a link record; linking cannot start again
    /// until it is removed.
    #[error("user {0} already has an ORCID link")]
    AlreadyLinked(String),

    /// No credential supplied, or the credential is invalid or expired.
    #[error("authorization required")]
    AuthorizationRequired,

    /// The caller is authenticated but does not own the target resource
    /// and holds no role that overrides ownership.
    #[error("not authorized")]
    NotAuthorized,

    /// The resource does not exist. Also covers sessions in the wrong
    /// stage and expired sessions: an unusable capability reads the same
    /// as a missing one.
    #[error("not found")]
    NotFound,

    /// An upstream service (ORCID or the auth service) reported a failure
    /// or could not be reached.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// An upstream response was not declared as JSON.
    #[error("upstream returned non-JSON content type: {0}")]
    UpstreamContentType(String),

    /// An upstream response body could not be decoded.
    #[error("upstream response could not be decoded: {0}")]
    UpstreamDecode(String),

    /// Unexpected internal failure, e.g. the document store is unusable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable numeric code for API responses.
    pub fn code(&self) -> u32 {
        match self {
            Error::AlreadyLinked(_) => 1000,
            Error::AuthorizationRequired => 1010,
            Error::NotAuthorized => 1011,
            Error::NotFound => 1020,
            Error::Upstream(_) => 1040,
            Error::UpstreamContentType(_) => 1041,
            Error::UpstreamDecode(_) => 1042,
            Error::Internal(_) => 1050,
        }
    }
}

impl From<orcid::Error> for Error {
    fn from(err: orcid::Error) -> Self {
        match err {
            orcid::Error::Http(message) => Error::Upstream(message),
            orcid::Error::WrongContentType(content_type) => {
                Error::UpstreamContentType(content_type)
            }
            orcid::Error::EmptyBody => Error::UpstreamDecode("empty body".into()),
            orcid::Error::Decode(message) => Error::UpstreamDecode(message),
            orcid::Error::OAuth { code, description } => {
                if code.denies_authorization() {
                    Error::NotAuthorized
                } else {
                    Error::Upstream(format!(
                        "OAuth error {}: {}",
                        code.as_str(),
                        description.as_deref().unwrap_or("(no description)")
                    ))
                }
            }
        }
    }
}

impl From<platform_auth::AuthError> for Error {
    fn from(err: platform_auth::AuthError) -> Self {
        match err {
            platform_auth::AuthError::AuthorizationRequired => Error::AuthorizationRequired,
            platform_auth::AuthError::WrongContentType(content_type) => {
                Error::UpstreamContentType(content_type)
            }
            platform_auth::AuthError::Decode(message) => Error::UpstreamDecode(message),
            platform_auth::AuthError::Upstream(message) => Error::Upstream(message),
        }
    }
}

impl From<linkstore::Error> for Error {
    fn from(err: linkstore::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Result alias for link operations.
pub type Result<T> = std::result::Result<T, Error>;
