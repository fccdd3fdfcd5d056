//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;

use airwave_core::Provider;

use super::{
    Account, AccountId, AuthorizationRequest, IdentityStore, LinkId, ProviderLink, Session,
    SessionId, SessionStore, StoreError, StoreResult, MAX_PENDING_AUTHORIZATIONS,
};
use crate::crypto::generate_secret;

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

/// In-memory identity store
pub struct InMemoryIdentityStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    /// Lowercased email -> account; the uniqueness index for accounts
    emails: RwLock<HashMap<String, AccountId>>,
    links: RwLock<HashMap<(Provider, String), ProviderLink>>,
    pending: RwLock<HashMap<String, AuthorizationRequest>>,
    pending_limit: usize,
    next_account_id: AtomicU64,
    next_link_id: AtomicU64,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            emails: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            pending_limit: MAX_PENDING_AUTHORIZATIONS,
            next_account_id: AtomicU64::new(1),
            next_link_id: AtomicU64::new(1),
        }
    }

    /// Cap the number of pending authorization requests
    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit;
        self
    }

    /// Number of accounts (for tests and diagnostics)
    pub fn account_count(&self) -> StoreResult<usize> {
        Ok(self.accounts.read().map_err(poisoned)?.len())
    }

    /// Number of provider links (for tests and diagnostics)
    pub fn link_count(&self) -> StoreResult<usize> {
        Ok(self.links.read().map_err(poisoned)?.len())
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn create_account(&self, email: &str) -> StoreResult<AccountId> {
        let normalized = email.trim().to_lowercase();

        // Holding the email index across the insert makes check-and-create atomic
        let mut emails = self.emails.write().map_err(poisoned)?;
        if emails.contains_key(&normalized) {
            return Err(StoreError::Conflict(format!("account email {}", normalized)));
        }

        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        self.accounts.write().map_err(poisoned)?.insert(
            id,
            Account {
                id,
                email: normalized.clone(),
                created_at: Utc::now(),
            },
        );
        emails.insert(normalized, id);
        Ok(id)
    }

    fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().map_err(poisoned)?.get(&account_id).cloned())
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let normalized = email.trim().to_lowercase();
        let account_id = self.emails.read().map_err(poisoned)?.get(&normalized).copied();
        match account_id {
            Some(id) => self.get_account(id),
            None => Ok(None),
        }
    }

    fn create_link(
        &self,
        account_id: AccountId,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<LinkId> {
        if !self.accounts.read().map_err(poisoned)?.contains_key(&account_id) {
            return Err(StoreError::NotFound(format!("account {}", account_id.0)));
        }

        let key = (provider, external_id.to_string());
        let mut links = self.links.write().map_err(poisoned)?;
        if links.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "provider link {}/{}",
                provider, external_id
            )));
        }

        let id = LinkId(self.next_link_id.fetch_add(1, Ordering::SeqCst));
        links.insert(
            key,
            ProviderLink {
                id,
                account_id,
                provider,
                external_id: external_id.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn get_link(&self, provider: Provider, external_id: &str) -> StoreResult<Option<ProviderLink>> {
        let links = self.links.read().map_err(poisoned)?;
        Ok(links.get(&(provider, external_id.to_string())).cloned())
    }

    fn list_links(&self, account_id: AccountId) -> StoreResult<Vec<ProviderLink>> {
        let links = self.links.read().map_err(poisoned)?;
        let mut found: Vec<ProviderLink> = links
            .values()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect();
        found.sort_by_key(|l| l.id.0);
        Ok(found)
    }

    fn save_authorization(&self, request: AuthorizationRequest) -> StoreResult<()> {
        let mut pending = self.pending.write().map_err(poisoned)?;
        if pending.len() >= self.pending_limit {
            let now = Utc::now();
            pending.retain(|_, r| !r.is_expired_at(now));
            if pending.len() >= self.pending_limit {
                return Err(StoreError::CapacityExceeded(format!(
                    "{} pending authorization requests",
                    pending.len()
                )));
            }
        }
        pending.insert(request.state.clone(), request);
        Ok(())
    }

    fn take_authorization(&self, state: &str) -> StoreResult<Option<AuthorizationRequest>> {
        Ok(self.pending.write().map_err(poisoned)?.remove(state))
    }

    fn cleanup_expired_authorizations(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut pending = self.pending.write().map_err(poisoned)?;
        let before = pending.len();
        pending.retain(|_, r| !r.is_expired_at(now));
        Ok((before - pending.len()) as u64)
    }
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, account_id: AccountId) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(generate_secret()),
            account_id,
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().map_err(poisoned)?.get(session_id).cloned())
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        self.sessions.write().map_err(poisoned)?.remove(session_id);
        Ok(())
    }
}
