use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Credentials, Resource, User, UserAccount};
use crate::filter::QuerySpec;

/// Storage for one resource collection.
///
/// Every mutating call is a single-document write; uniqueness is enforced by
/// the store and reported as `DatabaseError::Duplicate`.
#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    async fn insert(&self, doc: R) -> Result<R, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, DatabaseError>;

    /// Matching documents, projected and paged as `spec` asks
    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>, DatabaseError>;

    /// Number of documents matching the predicates of `spec`, ignoring paging
    async fn count(&self, spec: &QuerySpec) -> Result<u64, DatabaseError>;

    /// Replace a stored document. `None` when it no longer exists.
    async fn update(&self, doc: R) -> Result<Option<R>, DatabaseError>;

    /// `false` when nothing was deleted
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Delete every document whose reference `field` holds `id`; returns
    /// how many went
    async fn delete_referencing(&self, field: &str, id: Uuid) -> Result<u64, DatabaseError>;
}

/// Account lookups and credential writes used by the auth flows
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_account(&self, account: UserAccount) -> Result<User, DatabaseError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError>;

    /// Case-insensitive on the normalized (lower-case) address
    async fn find_account_by_email(&self, email: &str) -> Result<Option<UserAccount>, DatabaseError>;

    async fn find_account_by_reset_token(&self, token_hash: &str) -> Result<Option<UserAccount>, DatabaseError>;

    async fn save_credentials(&self, id: Uuid, credentials: &Credentials) -> Result<(), DatabaseError>;

    /// `false` when the user does not exist
    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, DatabaseError>;
}
