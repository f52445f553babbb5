//! Platform authentication client
//!
//! Wraps the platform's authentication service: raw bearer credentials go
//! in, verified identity and account information comes out. Verified
//! results are held in a bounded TTL cache so repeated calls with the same
//! credential do not hammer the auth service.

pub mod cache;
pub mod error;
pub mod types;
pub mod verifier;

pub use cache::TokenCache;
pub use error::{AuthError, Result};
pub use types::{AccountInfo, Identity, PolicyAgreement, Role, TokenInfo};
pub use verifier::AuthVerifier;
