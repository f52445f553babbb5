//! Credential verification against the auth service
//!
//! Turns raw bearer credentials into verified identity (`/api/V2/token`)
//! and account (`/api/V2/me`) information, consulting the cache first.
//! Upstream failures are normalized into the `AuthError` taxonomy; nothing
//! is silently defaulted.

use std::time::Duration;

use metrics::counter;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::TokenCache;
use crate::error::{AuthError, Result};
use crate::types::{AccountInfo, TokenInfo};

/// Verifier wrapping the platform auth service.
///
/// Holds separate caches for token and account lookups; both are keyed by
/// the (hashed) credential and share the same eviction policy.
pub struct AuthVerifier {
    http: reqwest::Client,
    base_url: String,
    token_cache: TokenCache<TokenInfo>,
    account_cache: TokenCache<AccountInfo>,
    default_ttl: Duration,
}

impl AuthVerifier {
    /// Create a verifier for the auth service at `base_url` (no trailing
    /// slash). `default_ttl` caps how long verified results are cached;
    /// the auth service's own cache hint can only shorten it.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        cache_max_entries: usize,
        default_ttl: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token_cache: TokenCache::new(cache_max_entries),
            account_cache: TokenCache::new(cache_max_entries),
            default_ttl,
        }
    }

    /// Verify a bearer credential, returning its token information.
    pub async fn verify_token(&self, credential: &str) -> Result<TokenInfo> {
        if credential.is_empty() {
            return Err(AuthError::AuthorizationRequired);
        }

        if let Some(info) = self.token_cache.get(credential) {
            counter!("auth_cache_hits_total", "lookup" => "token").increment(1);
            return Ok(info);
        }
        counter!("auth_cache_misses_total", "lookup" => "token").increment(1);

        let response = self
            .http
            .get(format!("{}/api/V2/token", self.base_url))
            .header("authorization", credential)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("auth service request failed: {e}")))?;

        let info: TokenInfo = decode_auth_response(response).await?;
        debug!(user = %info.user, "verified token");

        let ttl = self.default_ttl.min(Duration::from_millis(info.cachefor));
        self.token_cache.put(credential, info.clone(), ttl);
        Ok(info)
    }

    /// Verify a bearer credential and return the owning account,
    /// including roles. Used to gate privileged operations.
    pub async fn verify_account(&self, credential: &str) -> Result<AccountInfo> {
        if credential.is_empty() {
            return Err(AuthError::AuthorizationRequired);
        }

        if let Some(account) = self.account_cache.get(credential) {
            counter!("auth_cache_hits_total", "lookup" => "account").increment(1);
            return Ok(account);
        }
        counter!("auth_cache_misses_total", "lookup" => "account").increment(1);

        let response = self
            .http
            .get(format!("{}/api/V2/me", self.base_url))
            .header("authorization", credential)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("auth service request failed: {e}")))?;

        let account: AccountInfo = decode_auth_response(response).await?;
        debug!(user = %account.user, "verified account");

        self.account_cache
            .put(credential, account.clone(), self.default_ttl);
        Ok(account)
    }
}

/// Error envelope the auth service wraps application errors in.
#[derive(Deserialize)]
struct AuthErrorEnvelope {
    error: AuthErrorInfo,
}

#[derive(Deserialize)]
struct AuthErrorInfo {
    apperror: String,
    #[serde(default)]
    message: Option<String>,
}

/// Decode an auth service response into the expected shape or a typed error.
async fn decode_auth_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.starts_with("application/json") {
        let declared = if content_type.is_empty() {
            String::from("(none)")
        } else {
            content_type
        };
        return Err(AuthError::WrongContentType(declared));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AuthError::Upstream(format!("reading auth service body: {e}")))?;

    if status.is_success() {
        return serde_json::from_slice(&body)
            .map_err(|e| AuthError::Decode(format!("auth service response: {e}")));
    }

    let envelope: AuthErrorEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AuthError::Decode(format!("auth service error response: {e}")))?;

    let apperror = envelope.error.apperror.to_ascii_lowercase();
    if apperror.contains("invalid token") || apperror.contains("expired") {
        return Err(AuthError::AuthorizationRequired);
    }
    Err(AuthError::Upstream(
        envelope.error.message.unwrap_or(envelope.error.apperror),
    ))
}
