//! ORCID OAuth token endpoint client
//!
//! Handles the three token endpoint interactions:
//! 1. Authorization code exchange (completes a linking session)
//! 2. Token refresh (retirement-driven, at link read time)
//! 3. Token revocation (best-effort cleanup on unlink)
//!
//! All three POST form-encoded data with the confidential client
//! credentials. ORCID is a confidential-client flow: the client secret is
//! held server-side, so no PKCE parameters are involved.

use common::Secret;
use reqwest::header;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{OAuthErrorBody, OAuthTokenSet};

/// OAuth scopes requested when linking an ORCID account.
pub const SCOPES: &str = "/read-limited openid /activities/update";

/// Client for ORCID's OAuth API.
///
/// `base_url` is the OAuth API base (e.g. `https://orcid.org/oauth`),
/// without a trailing slash. Endpoints are `{base_url}/authorize`,
/// `{base_url}/token`, and `{base_url}/revoke`.
pub struct OrcidOAuthClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
}

impl OrcidOAuthClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Build the authorization (consent screen) URL for a linking session.
    ///
    /// `state` carries the session id through the browser round-trip; ORCID
    /// returns it unchanged on the continuation redirect. `prompt=login` is
    /// added unless the caller asked to skip it, forcing ORCID to show the
    /// login form even when the browser has an active ORCID session.
    pub fn authorize_url(&self, state: &str, skip_prompt: bool) -> String {
        let mut url = format!(
            "{}/authorize?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
            self.base_url,
            self.client_id,
            urlencoded(SCOPES),
            urlencoded(&self.redirect_uri),
            state,
        );
        if !skip_prompt {
            url.push_str("&prompt=login");
        }
        url
    }

    /// Exchange an authorization code for a token set.
    ///
    /// Called by the continuation leg of a linking session after ORCID
    /// redirects the browser back with the code.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokenSet> {
        debug!("exchanging authorization code");
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose().as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        parse_token_response(response).await
    }

    /// Obtain a fresh token set using a stored refresh token.
    ///
    /// Called when a link is read past its retirement time.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokenSet> {
        debug!("refreshing token set");
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose().as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        parse_token_response(response).await
    }

    /// Revoke an access token.
    ///
    /// Advisory cleanup: callers log a failure and proceed with their
    /// primary operation. A revoke outcome never gates deletion.
    pub async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/revoke", self.base_url))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose().as_str()),
                ("token", access_token),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("revoke request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Http(format!("revoke endpoint returned {status}: {body}")));
        }
        Ok(())
    }
}

/// Decode a token endpoint response into a token set or a typed error.
///
/// Content type is checked before status so a load balancer error page
/// (HTML with a 502) reports as a protocol error, not a decode failure.
async fn parse_token_response(response: reqwest::Response) -> Result<OAuthTokenSet> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.starts_with("application/json") {
        let declared = if content_type.is_empty() {
            String::from("(none)")
        } else {
            content_type
        };
        return Err(Error::WrongContentType(declared));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading token response body: {e}")))?;

    if body.is_empty() {
        return Err(Error::EmptyBody);
    }

    if status.is_success() {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("token response: {e}")))
    } else {
        let oauth_error: OAuthErrorBody = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("OAuth error response: {e}")))?;
        Err(Error::OAuth {
            code: oauth_error.error,
            description: oauth_error.error_description,
        })
    }
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}
