//! Prometheus metrics exposition
//!
//! The service exposes counters recorded across the workspace crates:
//!
//! - `linking_sessions_created_total` / `linking_sessions_finished_total`
//! - `orcid_token_refreshes_total`
//! - `orcid_revoke_failures_total`
//! - `auth_cache_hits_total` / `auth_cache_misses_total` (label `lookup`)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for
/// rendering the text exposition format on the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}
