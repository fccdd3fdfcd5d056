//! Storage abstractions for the gateway
//!
//! Account creation and linking rely on uniqueness constraints in the
//! store: a second writer for the same email or the same
//! (provider, external id) gets [`StoreError::Conflict`](crate::error::StoreError::Conflict)
//! rather than a duplicate row.

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryIdentityStore, InMemorySessionStore};
pub use models::*;
pub use sqlite::SqliteStore;

use airwave_core::Provider;

pub use crate::error::{StoreError, StoreResult};

/// Trait for accounts, provider links and pending authorization requests
pub trait IdentityStore: Send + Sync {
    /// Create an account; `Conflict` if the email is already taken
    fn create_account(&self, email: &str) -> StoreResult<AccountId>;

    /// Get an account by ID
    fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>>;

    /// Get an account by email (case-insensitive)
    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Link a provider identity to an account; `Conflict` if the identity is already linked
    fn create_link(
        &self,
        account_id: AccountId,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<LinkId>;

    /// Get the link for a provider identity
    fn get_link(&self, provider: Provider, external_id: &str) -> StoreResult<Option<ProviderLink>>;

    /// List all provider links of an account
    fn list_links(&self, account_id: AccountId) -> StoreResult<Vec<ProviderLink>>;

    /// Store a pending authorization request
    fn save_authorization(&self, request: AuthorizationRequest) -> StoreResult<()>;

    /// Remove and return a pending authorization request
    fn take_authorization(&self, state: &str) -> StoreResult<Option<AuthorizationRequest>>;

    /// Delete authorization requests past their TTL
    fn cleanup_expired_authorizations(&self) -> StoreResult<u64>;
}

/// Trait for session storage
pub trait SessionStore: Send + Sync {
    /// Create a new session for an account
    fn create(&self, account_id: AccountId) -> StoreResult<Session>;

    /// Get a session by ID
    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    /// Delete a session
    fn delete(&self, session_id: &SessionId) -> StoreResult<()>;
}
