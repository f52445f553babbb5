//! Link record manager
//!
//! Owns the durable link after a session is finalized: serves reads with
//! retirement-driven refresh, and handles unlinking for owners and
//! managers. Refresh happens at read time, not in a background job, so a
//! link that is never read never burns a refresh.

use std::sync::Arc;
use std::time::Duration;

use linkstore::{LinkRecord, LinkStore};
use metrics::counter;
use orcid::OrcidOAuthClient;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::now_millis;

/// Full projection of a link, returned to its owner. Public-safe: no
/// tokens.
#[derive(Debug, Clone, Serialize)]
pub struct LinkView {
    pub username: String,
    pub orcid: String,
    pub name: String,
    pub scope: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub retires_at: u64,
}

/// Minimal projection of a link, returned to anyone else.
#[derive(Debug, Clone, Serialize)]
pub struct LinkViewMinimal {
    pub username: String,
    pub orcid: String,
    pub name: String,
}

/// Manager for durable link records.
pub struct LinkManager {
    store: Arc<LinkStore>,
    orcid: Arc<OrcidOAuthClient>,
    retirement_age: Duration,
}

impl LinkManager {
    pub fn new(
        store: Arc<LinkStore>,
        orcid: Arc<OrcidOAuthClient>,
        retirement_age: Duration,
    ) -> Self {
        Self {
            store,
            orcid,
            retirement_age,
        }
    }

    /// Fetch the link for `username`, refreshing the token set first if
    /// the record is past its retirement time.
    ///
    /// A retired read performs exactly one refresh and re-persists the
    /// record with `created_at = now` and recomputed expiry/retirement.
    pub async fn get_for_user(&self, username: &str) -> Result<Option<LinkRecord>> {
        let Some(record) = self.store.links().get(username).await else {
            return Ok(None);
        };

        let now = now_millis();
        if !record.is_retired(now) {
            return Ok(Some(record));
        }

        debug!(username, "link past retirement, refreshing token set");
        let refreshed = self
            .orcid
            .refresh(&record.orcid_auth.refresh_token)
            .await?;
        counter!("orcid_token_refreshes_total").increment(1);

        let record = LinkRecord {
            username: username.to_string(),
            created_at: now,
            expires_at: now + refreshed.expires_in * 1000,
            retires_at: now + self.retirement_age.as_millis() as u64,
            orcid_auth: refreshed,
        };
        self.store
            .links()
            .insert(username.to_string(), record.clone())
            .await?;
        info!(username, "refreshed link token set");
        Ok(Some(record))
    }

    /// The owner's view of their link.
    pub async fn get_owner_view(&self, username: &str) -> Result<LinkView> {
        let record = self
            .get_for_user(username)
            .await?
            .ok_or(Error::NotFound)?;
        Ok(LinkView {
            username: record.username,
            orcid: record.orcid_auth.orcid,
            name: record.orcid_auth.name,
            scope: record.orcid_auth.scope,
            created_at: record.created_at,
            expires_at: record.expires_at,
            retires_at: record.retires_at,
        })
    }

    /// The view of a link shown to anyone other than its owner.
    pub async fn get_other_view(&self, username: &str) -> Result<LinkViewMinimal> {
        let record = self
            .get_for_user(username)
            .await?
            .ok_or(Error::NotFound)?;
        Ok(LinkViewMinimal {
            username: record.username,
            orcid: record.orcid_auth.orcid,
            name: record.orcid_auth.name,
        })
    }

    /// Remove the link for `username`.
    ///
    /// Allowed for the owner, or for a caller holding the configured
    /// manager role (`is_manager` is decided by the caller from verified
    /// account information). The stored access token is revoked first on
    /// a best-effort basis.
    pub async fn delete(&self, username: &str, caller: &str, is_manager: bool) -> Result<()> {
        let Some(record) = self.store.links().get(username).await else {
            return Err(Error::NotFound);
        };
        if caller != username && !is_manager {
            return Err(Error::NotAuthorized);
        }

        if let Err(e) = self.orcid.revoke(&record.orcid_auth.access_token).await {
            counter!("orcid_revoke_failures_total").increment(1);
            warn!(username, error = %e, "revoke failed during unlink, proceeding");
        }

        self.store.links().remove(username).await?;
        info!(username, caller, "link deleted");
        Ok(())
    }
}
