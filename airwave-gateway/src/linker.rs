//! Account linking
//!
//! Maps a provider identity onto exactly one internal account. Duplicate
//! accounts and links are kept out by the store's uniqueness constraints;
//! a writer that loses a race sees `Conflict` and re-reads the winner's row.

use std::sync::Arc;

use thiserror::Error;

use airwave_core::NormalizedIdentity;

use crate::store::{AccountId, IdentityStore, StoreError};

/// How the identity was resolved to its account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// The provider identity was already linked
    Existing,
    /// A new link was attached to the account holding the email
    AttachedToAccount,
    /// A new account was created along with the link
    NewAccount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOutcome {
    pub account_id: AccountId,
    pub kind: LinkKind,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("identity has no verified email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store reported a conflict but the conflicting row could not be read back
    #[error("conflict on {0} but no row found on re-read")]
    UnresolvedConflict(&'static str),
}

pub struct AccountLinker<I: IdentityStore> {
    store: Arc<I>,
}

impl<I: IdentityStore> AccountLinker<I> {
    pub fn new(store: Arc<I>) -> Self {
        Self { store }
    }

    /// Find or create the account for `identity` and make sure the provider link exists
    pub fn link_or_create(&self, identity: &NormalizedIdentity) -> Result<LinkOutcome, LinkError> {
        let provider = identity.provider;

        if let Some(link) = self.store.get_link(provider, &identity.external_id)? {
            return Ok(LinkOutcome {
                account_id: link.account_id,
                kind: LinkKind::Existing,
            });
        }

        let email = identity
            .verified_email
            .as_deref()
            .ok_or(LinkError::MissingEmail)?;

        let (account_id, mut kind) = self.find_or_create_account(email)?;

        match self.store.create_link(account_id, provider, &identity.external_id) {
            Ok(link_id) => {
                tracing::info!(
                    %provider,
                    account_id = account_id.0,
                    link_id = link_id.0,
                    "Linked provider identity"
                );
            }
            Err(StoreError::Conflict(detail)) => {
                tracing::debug!(%provider, %detail, "Link already created concurrently, re-reading");
                let link = self
                    .store
                    .get_link(provider, &identity.external_id)?
                    .ok_or(LinkError::UnresolvedConflict("provider link"))?;
                if link.account_id != account_id {
                    tracing::warn!(
                        %provider,
                        winner = link.account_id.0,
                        orphan = account_id.0,
                        "Concurrent login linked identity to another account"
                    );
                }
                return Ok(LinkOutcome {
                    account_id: link.account_id,
                    kind: LinkKind::Existing,
                });
            }
            Err(e) => return Err(e.into()),
        }

        if kind == LinkKind::NewAccount {
            tracing::info!(account_id = account_id.0, "Created account");
        } else {
            kind = LinkKind::AttachedToAccount;
        }

        Ok(LinkOutcome { account_id, kind })
    }

    fn find_or_create_account(&self, email: &str) -> Result<(AccountId, LinkKind), LinkError> {
        if let Some(account) = self.store.get_account_by_email(email)? {
            return Ok((account.id, LinkKind::AttachedToAccount));
        }

        match self.store.create_account(email) {
            Ok(id) => Ok((id, LinkKind::NewAccount)),
            Err(StoreError::Conflict(_)) => {
                let account = self
                    .store
                    .get_account_by_email(email)?
                    .ok_or(LinkError::UnresolvedConflict("account email"))?;
                Ok((account.id, LinkKind::AttachedToAccount))
            }
            Err(e) => Err(e.into()),
        }
    }
}
