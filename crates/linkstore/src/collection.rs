//! JSON-file-backed document collection
//!
//! One collection per file, keyed by an opaque string (username for links,
//! session id for sessions). A tokio Mutex serializes all access; every
//! mutation rewrites the file atomically via temp file + rename, with 0600
//! permissions since documents carry OAuth tokens.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A keyed document collection persisted as a single JSON file.
pub struct Collection<T> {
    path: PathBuf,
    state: Mutex<HashMap<String, T>>,
}

impl<T> Collection<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Load a collection from the given file path.
    ///
    /// If the file doesn't exist it is created as `{}`, so future loads
    /// skip the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;
            let documents: HashMap<String, T> = serde_json::from_str(&contents)
                .map_err(|e| Error::Corrupt(format!("{}: {e}", path.display())))?;
            info!(path = %path.display(), documents = documents.len(), "loaded collection");
            documents
        } else {
            info!(path = %path.display(), "collection file not found, starting empty");
            let documents = HashMap::new();
            write_atomic(&path, &documents).await?;
            documents
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the document stored under `key`.
    pub async fn get(&self, key: &str) -> Option<T> {
        let state = self.state.lock().await;
        state.get(key).cloned()
    }

    /// Whether a document exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let state = self.state.lock().await;
        state.contains_key(key)
    }

    /// Insert or replace the document under `key` and persist.
    ///
    /// Returns the replaced document if one existed.
    pub async fn insert(&self, key: String, document: T) -> Result<Option<T>> {
        let mut state = self.state.lock().await;
        let previous = state.insert(key.clone(), document);
        debug!(key, "stored document");
        write_atomic(&self.path, &state).await?;
        Ok(previous)
    }

    /// Remove the document under `key` and persist.
    ///
    /// Returns the removed document if it existed; callers use this as an
    /// atomic take, e.g. as the commit point when finalizing a session.
    pub async fn remove(&self, key: &str) -> Result<Option<T>> {
        let mut state = self.state.lock().await;
        let removed = state.remove(key);
        if removed.is_some() {
            debug!(key, "removed document");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// All keys currently in the collection.
    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.keys().cloned().collect()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every document and persist. Test reset hook.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.clear();
        write_atomic(&self.path, &state).await
    }
}

/// Write a collection to its file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write leaves the previous contents intact.
/// Permissions are set to 0600 (owner read/write only).
async fn write_atomic<T: Serialize>(path: &Path, data: &HashMap<String, T>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Corrupt(format!("serializing collection: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("collection path has no parent directory".into()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("collection");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp collection file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting collection file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp collection file: {e}")))?;

    debug!(path = %path.display(), "persisted collection");
    Ok(())
}
