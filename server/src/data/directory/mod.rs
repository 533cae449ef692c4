//! Identity directory
//!
//! Owns identity records (subject, provider, role, credential hash). The session
//! layer reads roles at refresh time and credentials at login; administrators
//! manage records through the admin routes.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryDirectory;

use super::identity::{IdentityRecord, IdentityUpdate, NewIdentity, Provider};

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Identity already exists: {email} ({provider})")]
    Duplicate { email: String, provider: Provider },

    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("Identity directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and management of identity records
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Find an identity by its token subject and provider
    async fn find(
        &self,
        email: &str,
        provider: Provider,
    ) -> Result<Option<IdentityRecord>, DirectoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<IdentityRecord>, DirectoryError>;

    /// All identities, oldest first
    async fn list(&self) -> Result<Vec<IdentityRecord>, DirectoryError>;

    /// Register an identity; fails with `Duplicate` if (email, provider) is taken
    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, DirectoryError>;

    async fn update(
        &self,
        id: &str,
        update: IdentityUpdate,
    ) -> Result<IdentityRecord, DirectoryError>;

    /// Remove an identity, returning the removed record
    async fn delete(&self, id: &str) -> Result<IdentityRecord, DirectoryError>;
}
