//! Identity storage for the auth server.
//!
//! `CredentialStore` is the seam the credential service and access guard
//! depend on. Uniqueness of `email` and `username` is enforced by the store
//! itself, so concurrent registrations cannot both succeed even across
//! several server instances sharing one database.

pub mod memory;
pub mod models;
pub mod operations;

pub use memory::MemoryCredentialStore;
pub use models::{Identity, PublicUser};
pub use operations::PgCredentialStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persists a new identity, failing with `DatabaseError::Duplicate` when
    /// the email (checked first) or username is already taken.
    async fn insert_identity(&self, identity: Identity) -> Result<Identity, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, DatabaseError>;

    /// Returns whether a row was removed.
    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn count(&self) -> Result<u64, DatabaseError>;

    async fn close(&self) {}
}
