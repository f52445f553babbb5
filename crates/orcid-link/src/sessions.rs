//! Linking-session state machine
//!
//! Drives one OAuth linking attempt through its stages:
//!
//! ```text
//! create -> Initial -> start -> Started -> continue -> Completed -> finish -> LinkRecord
//!                                                                             (session deleted)
//! ```
//!
//! Transitions are linear; nothing moves backward. A session in the wrong
//! stage for an operation is reported as `NotFound`, the same as an absent
//! or expired session. Ownership is enforced on `create`, `get`, `delete`,
//! and `finish`; `start` and `continue` are reached by browser redirect,
//! where the session id itself is the capability because the redirect
//! cannot reliably carry the auth cookie.

use std::sync::Arc;
use std::time::Duration;

use linkstore::{LinkRecord, LinkStore, LinkingSession};
use metrics::counter;
use orcid::OrcidOAuthClient;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::now_millis;

/// Public-safe projection of a completed session's ORCID data.
///
/// Never carries tokens; this is what the UI shows on the confirmation
/// screen before the user finalizes the link.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOrcidView {
    pub name: String,
    pub orcid: String,
    pub scope: String,
}

/// View of a completed session returned to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedSessionView {
    pub session_id: String,
    pub username: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub return_link: Option<String>,
    pub skip_prompt: bool,
    pub orcid: SessionOrcidView,
}

/// Result of the continuation leg, used by the HTTP layer to pick the
/// redirect target.
#[derive(Debug, Clone)]
pub struct ContinueOutcome {
    pub username: String,
    pub return_link: Option<String>,
}

/// The linking-session state machine.
pub struct SessionManager {
    store: Arc<LinkStore>,
    orcid: Arc<OrcidOAuthClient>,
    session_lifetime: Duration,
    retirement_age: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<LinkStore>,
        orcid: Arc<OrcidOAuthClient>,
        session_lifetime: Duration,
        retirement_age: Duration,
    ) -> Self {
        Self {
            store,
            orcid,
            session_lifetime,
            retirement_age,
        }
    }

    /// Create a linking session for `username`.
    ///
    /// The caller must be creating the session for themselves, and must
    /// not already have a link record. An in-flight session for the same
    /// user is not a conflict: only a finalized link blocks re-linking.
    pub async fn create(&self, username: &str, caller: &str) -> Result<String> {
        if username != caller {
            return Err(Error::NotAuthorized);
        }
        if self.store.links().contains(username).await {
            return Err(Error::AlreadyLinked(username.to_string()));
        }

        let session_id = Uuid::new_v4().as_simple().to_string();
        let now = now_millis();
        let session = LinkingSession::Initial {
            session_id: session_id.clone(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + self.session_lifetime.as_millis() as u64,
        };
        self.store
            .sessions()
            .insert(session_id.clone(), session)
            .await?;

        counter!("linking_sessions_created_total").increment(1);
        info!(username, session_id, "created linking session");
        Ok(session_id)
    }

    /// Record the start of the browser leg and return the ORCID
    /// authorization URL to redirect to.
    pub async fn start(
        &self,
        session_id: &str,
        return_link: Option<String>,
        skip_prompt: bool,
    ) -> Result<String> {
        let session = self.load_live(session_id).await?;
        let LinkingSession::Initial {
            session_id,
            username,
            created_at,
            expires_at,
        } = session
        else {
            return Err(Error::NotFound);
        };

        let started = LinkingSession::Started {
            session_id: session_id.clone(),
            username,
            created_at,
            expires_at,
            return_link,
            skip_prompt,
        };
        self.store
            .sessions()
            .insert(session_id.clone(), started)
            .await?;

        Ok(self.orcid.authorize_url(&session_id, skip_prompt))
    }

    /// Complete the browser leg: exchange the authorization code ORCID
    /// redirected back with, and store the resulting token set.
    ///
    /// On exchange failure the session is deleted: the authorization code
    /// is consumed either way, so the Started session can never complete
    /// and keeping it would only strand the user.
    pub async fn continue_linking(&self, session_id: &str, code: &str) -> Result<ContinueOutcome> {
        let session = self.load_live(session_id).await?;
        let LinkingSession::Started {
            session_id,
            username,
            created_at,
            expires_at,
            return_link,
            skip_prompt,
        } = session
        else {
            return Err(Error::NotFound);
        };

        let orcid_auth = match self.orcid.exchange_code(code).await {
            Ok(token_set) => token_set,
            Err(e) => {
                warn!(session_id, error = %e, "code exchange failed, deleting session");
                self.store.sessions().remove(&session_id).await?;
                return Err(e.into());
            }
        };

        let outcome = ContinueOutcome {
            username: username.clone(),
            return_link: return_link.clone(),
        };
        let completed = LinkingSession::Completed {
            session_id: session_id.clone(),
            username,
            created_at,
            expires_at,
            return_link,
            skip_prompt,
            orcid_auth,
        };
        self.store.sessions().insert(session_id, completed).await?;
        Ok(outcome)
    }

    /// Fetch a completed session for its owner.
    pub async fn get(&self, session_id: &str, caller: &str) -> Result<CompletedSessionView> {
        let session = self.load_completed_owned(session_id, caller).await?;
        let LinkingSession::Completed {
            session_id,
            username,
            created_at,
            expires_at,
            return_link,
            skip_prompt,
            orcid_auth,
        } = session
        else {
            return Err(Error::NotFound);
        };

        Ok(CompletedSessionView {
            session_id,
            username,
            created_at,
            expires_at,
            return_link,
            skip_prompt,
            orcid: SessionOrcidView {
                name: orcid_auth.name,
                orcid: orcid_auth.orcid,
                scope: orcid_auth.scope,
            },
        })
    }

    /// Delete a completed session without finalizing it, revoking the
    /// session's access token first on a best-effort basis.
    pub async fn delete(&self, session_id: &str, caller: &str) -> Result<()> {
        let session = self.load_completed_owned(session_id, caller).await?;
        if let LinkingSession::Completed { orcid_auth, .. } = &session {
            if let Err(e) = self.orcid.revoke(&orcid_auth.access_token).await {
                counter!("orcid_revoke_failures_total").increment(1);
                warn!(session_id, error = %e, "revoke failed during session delete, proceeding");
            }
        }
        self.store.sessions().remove(session_id).await?;
        info!(session_id, "deleted linking session");
        Ok(())
    }

    /// Finalize a completed session into a link record and delete it.
    ///
    /// This is the sole path that creates a link record. The session
    /// removal is the commit point: of two racing finish calls, the one
    /// whose remove observes an already-absent session gets `NotFound`.
    pub async fn finish(&self, session_id: &str, caller: &str) -> Result<()> {
        // Read-only validation first, so an unauthorized caller cannot
        // destroy someone else's session.
        self.load_completed_owned(session_id, caller).await?;

        let taken = self.store.sessions().remove(session_id).await?;
        let Some(LinkingSession::Completed {
            username,
            orcid_auth,
            ..
        }) = taken
        else {
            return Err(Error::NotFound);
        };

        let now = now_millis();
        let record = LinkRecord {
            username: username.clone(),
            created_at: now,
            expires_at: now + orcid_auth.expires_in * 1000,
            retires_at: now + self.retirement_age.as_millis() as u64,
            orcid_auth,
        };
        self.store.links().insert(username.clone(), record).await?;

        counter!("linking_sessions_finished_total").increment(1);
        info!(username, session_id, "finalized linking session into link");
        Ok(())
    }

    /// Load a session that is present and not past its lifetime. An
    /// expired session is deleted on encounter and reported `NotFound`.
    async fn load_live(&self, session_id: &str) -> Result<LinkingSession> {
        let Some(session) = self.store.sessions().get(session_id).await else {
            return Err(Error::NotFound);
        };
        if session.is_expired(now_millis()) {
            self.store.sessions().remove(session_id).await?;
            return Err(Error::NotFound);
        }
        Ok(session)
    }

    /// Load a live session that is Completed and owned by `caller`.
    async fn load_completed_owned(
        &self,
        session_id: &str,
        caller: &str,
    ) -> Result<LinkingSession> {
        let session = self.load_live(session_id).await?;
        if !matches!(session, LinkingSession::Completed { .. }) {
            return Err(Error::NotFound);
        }
        if session.username() != caller {
            return Err(Error::NotAuthorized);
        }
        Ok(session)
    }
}
