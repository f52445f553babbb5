//! Persistence for ORCID links and linking sessions
//!
//! A small document store: each collection is one JSON file mapping a
//! string key to a document. All writes are atomic (temp file + rename)
//! so a crash mid-write never corrupts stored credentials. The store is
//! the single source of truth; in-memory entities are value objects
//! reconstructed per call.

pub mod collection;
pub mod entities;
pub mod error;
pub mod store;

pub use collection::Collection;
pub use entities::{LinkRecord, LinkingSession};
pub use error::{Error, Result};
pub use store::LinkStore;
