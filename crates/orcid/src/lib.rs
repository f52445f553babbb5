//! ORCID OAuth client library
//!
//! Performs the three OAuth operations this service needs against ORCID's
//! OAuth API: authorization-code exchange, token refresh, and token
//! revocation. Also builds the authorization (consent) URL a linking
//! session redirects the browser to.
//!
//! This crate is a standalone library with no dependency on the service
//! binary. The base URL is constructor state so tests can point the client
//! at a local mock server.

pub mod client;
pub mod error;
pub mod types;

pub use client::{OrcidOAuthClient, SCOPES};
pub use error::{Error, Result};
pub use types::{OAuthErrorBody, OAuthErrorCode, OAuthTokenSet};
