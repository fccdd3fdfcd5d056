//! Data models for gateway storage

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use airwave_core::{Provider, ReturnSource};

/// How long an authorization request stays redeemable
pub const AUTHORIZATION_TTL_MINUTES: i64 = 10;

/// Upper bound on unredeemed authorization requests held at once
pub const MAX_PENDING_AUTHORIZATIONS: usize = 10_000;

/// Unique account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

/// Unique provider link identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// An internal user account, one per email
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    /// Lowercased
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Binds one (provider, external id) pair to one account
#[derive(Debug, Clone)]
pub struct ProviderLink {
    pub id: LinkId,
    pub account_id: AccountId,
    pub provider: Provider,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

/// A sign-in attempt waiting for its provider callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Anti-forgery state token, also the lookup key
    pub state: String,
    pub provider: Provider,
    pub return_source: ReturnSource,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl AuthorizationRequest {
    pub fn new(state: String, provider: Provider, return_source: ReturnSource) -> Self {
        Self {
            state,
            provider,
            return_source,
            issued_at: Utc::now(),
            ttl: Duration::minutes(AUTHORIZATION_TTL_MINUTES),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + self.ttl
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// A signed-in session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}
