//! Credential pools, rotation and persistence.
//!
//! Two independent pools exist: generation credentials (one active entry
//! per production batch) and publishing credentials (rotated per publish
//! batch over a working copy).

mod pool;
mod store;
mod types;

pub use pool::{CredentialPool, RotationQueue};
pub use store::{CredentialSettings, CredentialStore, SqliteCredentialStore};
pub use types::*;
