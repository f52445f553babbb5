//! ORCID OAuth wire types
//!
//! One serde struct per upstream response shape, decoded exactly once at
//! the client boundary.

use serde::{Deserialize, Serialize};

/// Success response from ORCID's token endpoint, for both code exchange
/// and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Callers
/// convert it to an absolute unix millisecond timestamp when persisting
/// the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenSet {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    pub scope: String,
    /// ORCID iD of the authorizing account, e.g. "0000-0001-2345-6789"
    pub orcid: String,
    /// Display name of the authorizing account as ORCID reports it
    pub name: String,
    /// OpenID Connect id token. Present on code exchange, usually absent
    /// on refresh responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// The fixed OAuth 2.0 error vocabulary ORCID's token endpoint uses.
///
/// An error body carrying a code outside this set fails deserialization
/// and surfaces as a decode error, which keeps "ORCID changed its response
/// shape" distinguishable from a well-formed denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
}

impl OAuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthErrorCode::InvalidRequest => "invalid_request",
            OAuthErrorCode::InvalidClient => "invalid_client",
            OAuthErrorCode::InvalidGrant => "invalid_grant",
            OAuthErrorCode::UnauthorizedClient => "unauthorized_client",
            OAuthErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            OAuthErrorCode::InvalidScope => "invalid_scope",
        }
    }

    /// Whether this code means the caller's grant was denied, as opposed
    /// to the request itself being malformed or unsupported.
    pub fn denies_authorization(&self) -> bool {
        matches!(
            self,
            OAuthErrorCode::InvalidGrant | OAuthErrorCode::UnauthorizedClient
        )
    }
}

/// Error response from ORCID's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: OAuthErrorCode,
    #[serde(default)]
    pub error_description: Option<String>,
}
