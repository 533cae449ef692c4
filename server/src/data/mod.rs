//! Data layer
//!
//! - `cache` - key-value store (in-memory or Redis) backing sessions and revocations
//! - `session` - current refresh token per identity
//! - `revocation` - access tokens invalidated before expiry
//! - `directory` - identity records (collaborator seam)
//! - `federation` - external identity providers (collaborator seam)
//! - `identity` - shared identity types

pub mod cache;
pub mod directory;
pub mod federation;
pub mod identity;
pub mod revocation;
pub mod session;

pub use cache::CacheService;
pub use directory::{DirectoryError, IdentityDirectory, InMemoryDirectory};
pub use federation::{FederatedIdentity, FederationError, HttpFederation, IdentityFederation};
pub use identity::{IdentityRecord, Provider, Role};
pub use revocation::RevocationList;
pub use session::SessionStore;
