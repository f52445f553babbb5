//! Stored entities: linking sessions and link records
//!
//! A linking session is the time-boxed record of one in-progress OAuth
//! linking attempt; the link record is the durable credential link it
//! produces. The session's three lifecycle stages are an explicit sum
//! type discriminated by a `state` tag, so a session can never carry a
//! token set without having passed through the started stage.

use orcid::OAuthTokenSet;
use serde::{Deserialize, Serialize};

/// One OAuth linking attempt, in one of its three stages.
///
/// Stages only ever advance: Initial -> Started -> Completed. The session
/// is deleted on finalization or abandonment. `session_id` and `username`
/// are immutable across stage transitions, and all timestamps are unix
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkingSession {
    /// Created when a user asks to start linking.
    Initial {
        session_id: String,
        username: String,
        created_at: u64,
        expires_at: u64,
    },
    /// The user has been redirected to ORCID's consent screen.
    Started {
        session_id: String,
        username: String,
        created_at: u64,
        expires_at: u64,
        return_link: Option<String>,
        skip_prompt: bool,
    },
    /// The authorization code exchange succeeded; awaiting finalization.
    Completed {
        session_id: String,
        username: String,
        created_at: u64,
        expires_at: u64,
        return_link: Option<String>,
        skip_prompt: bool,
        orcid_auth: OAuthTokenSet,
    },
}

impl LinkingSession {
    pub fn session_id(&self) -> &str {
        match self {
            LinkingSession::Initial { session_id, .. }
            | LinkingSession::Started { session_id, .. }
            | LinkingSession::Completed { session_id, .. } => session_id,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            LinkingSession::Initial { username, .. }
            | LinkingSession::Started { username, .. }
            | LinkingSession::Completed { username, .. } => username,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            LinkingSession::Initial { created_at, .. }
            | LinkingSession::Started { created_at, .. }
            | LinkingSession::Completed { created_at, .. } => *created_at,
        }
    }

    pub fn expires_at(&self) -> u64 {
        match self {
            LinkingSession::Initial { expires_at, .. }
            | LinkingSession::Started { expires_at, .. }
            | LinkingSession::Completed { expires_at, .. } => *expires_at,
        }
    }

    /// Whether the session's fixed lifetime has elapsed. The lifetime is
    /// set at creation and does not change across stage transitions.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at() <= now_millis
    }
}

/// The durable link between a platform account and an ORCID account.
///
/// At most one record exists per username; it is created only by
/// finalizing a completed linking session. `retires_at` drives proactive
/// refresh at read time; `expires_at` records when ORCID itself will
/// expire the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub username: String,
    pub orcid_auth: OAuthTokenSet,
    /// Unix milliseconds; reset on every refresh
    pub created_at: u64,
    /// Unix milliseconds; `created_at + orcid_auth.expires_in * 1000`
    pub expires_at: u64,
    /// Unix milliseconds; `created_at + configured retirement age`
    pub retires_at: u64,
}

impl LinkRecord {
    /// Whether the stored token set is due for a refresh.
    pub fn is_retired(&self, now_millis: u64) -> bool {
        self.retires_at <= now_millis
    }
}
