//! The two collections the service persists

use std::path::Path;

use crate::collection::Collection;
use crate::entities::{LinkRecord, LinkingSession};
use crate::error::Result;

/// Durable storage for the link service: links keyed by username,
/// linking sessions keyed by session id.
pub struct LinkStore {
    links: Collection<LinkRecord>,
    sessions: Collection<LinkingSession>,
}

impl LinkStore {
    /// Open (or initialize) the store under `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| crate::error::Error::Io(format!(
                "creating data directory {}: {e}",
                data_dir.display()
            )))?;

        Ok(Self {
            links: Collection::load(data_dir.join("links.json")).await?,
            sessions: Collection::load(data_dir.join("sessions.json")).await?,
        })
    }

    pub fn links(&self) -> &Collection<LinkRecord> {
        &self.links
    }

    pub fn sessions(&self) -> &Collection<LinkingSession> {
        &self.sessions
    }

    /// Drop all stored documents. Test reset hook.
    pub async fn clear(&self) -> Result<()> {
        self.links.clear().await?;
        self.sessions.clear().await
    }
}
