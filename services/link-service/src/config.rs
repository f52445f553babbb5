//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The ORCID client secret is loaded from the ORCID_CLIENT_SECRET env var
//! or client_secret_file, never stored in the TOML directly to avoid
//! leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub orcid: OrcidConfig,
    pub linking: LinkingConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

/// HTTP service settings
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// Per-call timeout applied to every upstream HTTP request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Platform auth service settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    pub base_url: String,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Upper bound on how long verified credentials are cached; the auth
    /// service's own cache hint can only shorten it
    #[serde(default = "default_cache_ttl")]
    pub cache_default_ttl_secs: u64,
}

/// ORCID OAuth settings
#[derive(Debug, Deserialize)]
pub struct OrcidConfig {
    /// OAuth API base, e.g. "https://orcid.org/oauth"
    pub oauth_base_url: String,
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// ORCID_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// The continuation URL registered with ORCID for this client
    pub redirect_uri: String,
}

/// Linking session and link lifecycle settings
#[derive(Debug, Deserialize)]
pub struct LinkingConfig {
    /// Fixed lifetime of a linking session from creation
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,
    /// Age at which a stored token set is proactively refreshed on read
    #[serde(default = "default_retirement_age")]
    pub retirement_age_secs: u64,
    /// Custom role permitting administrative deletion of another user's link
    pub manager_role: String,
}

/// Document store settings
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// UI redirect targets for the browser-facing legs
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// Page shown after a successful continuation leg
    pub completion_url: String,
    /// Page shown when a browser leg fails; receives code/message params
    pub error_url: String,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_cache_max_entries() -> usize {
    20000
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_session_lifetime() -> u64 {
    600
}

fn default_retirement_age() -> u64 {
    1_209_600 // two weeks
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Client secret resolution order:
    /// 1. ORCID_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        for (field, url) in [
            ("auth.base_url", &config.auth.base_url),
            ("orcid.oauth_base_url", &config.orcid.oauth_base_url),
            ("orcid.redirect_uri", &config.orcid.redirect_uri),
            ("ui.completion_url", &config.ui.completion_url),
            ("ui.error_url", &config.ui.error_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.orcid.client_id.is_empty() {
            return Err(common::Error::Config(
                "orcid.client_id must not be empty".into(),
            ));
        }
        if config.service.timeout_secs == 0 {
            return Err(common::Error::Config(
                "service.timeout_secs must be greater than 0".into(),
            ));
        }
        if config.service.max_connections == 0 {
            return Err(common::Error::Config(
                "service.max_connections must be greater than 0".into(),
            ));
        }
        if config.linking.session_lifetime_secs == 0 {
            return Err(common::Error::Config(
                "linking.session_lifetime_secs must be greater than 0".into(),
            ));
        }
        if config.linking.retirement_age_secs == 0 {
            return Err(common::Error::Config(
                "linking.retirement_age_secs must be greater than 0".into(),
            ));
        }
        if config.linking.manager_role.is_empty() {
            return Err(common::Error::Config(
                "linking.manager_role must not be empty".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("ORCID_CLIENT_SECRET") {
            config.orcid.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.orcid.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.orcid.client_secret = Some(Secret::new(secret));
            }
        }

        if config.orcid.client_secret.is_none() {
            return Err(common::Error::Config(
                "no ORCID client secret: set ORCID_CLIENT_SECRET or orcid.client_secret_file"
                    .into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("orcid-link-service.toml")
    }
}
