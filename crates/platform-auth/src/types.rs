//! Auth service wire types
//!
//! Field names mirror the auth service's JSON exactly; each response shape
//! is decoded once, at the verifier boundary.

use serde::{Deserialize, Serialize};

/// Verified credential information from `GET /api/V2/token`.
///
/// Ephemeral: produced by verification, held only in the token cache.
/// `cachefor` is the auth service's cache hint in milliseconds; the
/// effective cache TTL is the smaller of this and the configured default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub token_type: String,
    /// Unix milliseconds
    pub created: u64,
    /// Unix milliseconds
    pub expires: u64,
    /// Username owning the credential
    pub user: String,
    /// Cache hint in milliseconds
    pub cachefor: u64,
    #[serde(default)]
    pub custom: serde_json::Value,
}

/// A role granted to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub desc: String,
}

/// An external identity bound to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub provider: String,
    pub provusername: String,
}

/// A policy document the account holder has agreed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAgreement {
    pub id: String,
    /// Unix milliseconds
    pub agreedon: u64,
}

/// Account information from `GET /api/V2/me`.
///
/// Used to authorize privileged operations: the manager role lives in
/// `customroles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub user: String,
    pub display: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub customroles: Vec<String>,
    #[serde(default)]
    pub idents: Vec<Identity>,
    #[serde(default)]
    pub policyids: Vec<PolicyAgreement>,
}

impl AccountInfo {
    /// Whether the account holds the given custom role.
    pub fn has_custom_role(&self, role: &str) -> bool {
        self.customroles.iter().any(|r| r == role)
    }
}
