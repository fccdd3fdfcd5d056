//! OAuth authorization-code flow
//!
//! `begin` mints the anti-forgery state and the provider redirect.
//! `complete` runs the callback steps strictly in order, each one either
//! producing the input of the next or a [`FailureReason`]:
//!
//! 1. validate state (cookie, then the server-side pending request)
//! 2. exchange the code for an access token
//! 3. fetch the identity
//! 4. link or create the account
//! 5. start a session

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use airwave_core::{FailureReason, Provider, ReturnSource};

use crate::crypto::{generate_secret, secrets_match};
use crate::error::GatewayError;
use crate::linker::AccountLinker;
use crate::providers::{AdapterError, ProviderRegistry};
use crate::store::{AccountId, AuthorizationRequest, IdentityStore, SessionId, SessionStore};

/// Query parameters of a provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied access or the request was invalid
    pub error: Option<String>,
}

/// What `begin` hands back to the route: where to send the user and what to remember
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub state: String,
    pub return_source: ReturnSource,
    pub location: String,
}

/// Terminal state of a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Success {
        account_id: AccountId,
        session_id: SessionId,
    },
    Fail {
        reason: FailureReason,
    },
}

pub struct OAuthFlow<I: IdentityStore, S: SessionStore> {
    identity_store: Arc<I>,
    session_store: Arc<S>,
    providers: ProviderRegistry,
    linker: AccountLinker<I>,
}

impl<I: IdentityStore, S: SessionStore> OAuthFlow<I, S> {
    pub fn new(identity_store: Arc<I>, session_store: Arc<S>, providers: ProviderRegistry) -> Self {
        Self {
            linker: AccountLinker::new(identity_store.clone()),
            identity_store,
            session_store,
            providers,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Start an authorization: fresh state, pending request, provider URL
    pub fn begin(
        &self,
        provider: Provider,
        return_source: ReturnSource,
    ) -> Result<AuthorizationRedirect, GatewayError> {
        let adapter = self
            .providers
            .get(provider)
            .ok_or(GatewayError::ProviderNotConfigured(provider))?;

        let state = generate_secret();
        let location = adapter.authorization_url(&state)?;

        self.identity_store.save_authorization(AuthorizationRequest::new(
            state.clone(),
            provider,
            return_source.clone(),
        ))?;

        tracing::debug!(%provider, source = %return_source, "Authorization request issued");

        Ok(AuthorizationRedirect {
            state,
            return_source,
            location,
        })
    }

    /// Run the callback steps; `stored_state` is the value of the state cookie
    pub async fn complete(
        &self,
        provider: Provider,
        params: &CallbackParams,
        stored_state: Option<&str>,
    ) -> FlowOutcome {
        match self.run(provider, params, stored_state).await {
            Ok((account_id, session_id)) => {
                tracing::info!(%provider, account_id = account_id.0, "Sign-in completed");
                FlowOutcome::Success {
                    account_id,
                    session_id,
                }
            }
            Err(reason) => {
                tracing::warn!(%provider, %reason, "Sign-in failed");
                FlowOutcome::Fail { reason }
            }
        }
    }

    async fn run(
        &self,
        provider: Provider,
        params: &CallbackParams,
        stored_state: Option<&str>,
    ) -> Result<(AccountId, SessionId), FailureReason> {
        let code = self.validate_state(provider, params, stored_state)?;

        let adapter = self.providers.get(provider).ok_or_else(|| {
            tracing::error!(%provider, "Callback for a provider with no adapter");
            FailureReason::Unknown
        })?;

        let token = adapter
            .exchange_code(code)
            .await
            .map_err(|e| adapter_failure(FailureReason::TokenGen, e))?;

        let identity = adapter
            .fetch_identity(&token)
            .await
            .map_err(|e| adapter_failure(FailureReason::UserInfo, e))?;

        if !identity.has_verified_email() {
            tracing::warn!(
                %provider,
                external_id = %identity.external_id,
                "Identity has no verified email"
            );
            return Err(FailureReason::UserInfo);
        }

        let linked = self.linker.link_or_create(&identity).map_err(|e| {
            tracing::error!(%provider, error = %e, "Account linking failed");
            FailureReason::DbRegistration
        })?;
        tracing::debug!(%provider, kind = ?linked.kind, "Identity linked");

        let session = self
            .session_store
            .create(linked.account_id)
            .map_err(|e| {
                tracing::error!(account_id = linked.account_id.0, error = %e, "Session creation failed");
                FailureReason::SessionCreation
            })?;

        Ok((linked.account_id, session.id))
    }

    /// Check the callback state against the cookie and consume the pending request
    fn validate_state<'p>(
        &self,
        provider: Provider,
        params: &'p CallbackParams,
        stored_state: Option<&str>,
    ) -> Result<&'p str, FailureReason> {
        if let Some(error) = &params.error {
            tracing::warn!(%provider, %error, "Provider returned an error");
        }

        let (code, state, stored) = match (
            params.code.as_deref(),
            params.state.as_deref(),
            stored_state,
        ) {
            (Some(code), Some(state), Some(stored)) if !code.is_empty() && !state.is_empty() => {
                (code, state, stored)
            }
            _ => {
                tracing::debug!(%provider, "Callback missing code, state or state cookie");
                return Err(FailureReason::StateMismatch);
            }
        };

        if !secrets_match(state, stored) {
            tracing::warn!(%provider, "State does not match the state cookie");
            return Err(FailureReason::StateMismatch);
        }

        let pending = self.identity_store.take_authorization(state).map_err(|e| {
            tracing::error!(error = %e, "Failed to read pending authorization");
            FailureReason::Unknown
        })?;

        match pending {
            None => {
                tracing::warn!(%provider, "No pending authorization for state");
                Err(FailureReason::StateMismatch)
            }
            Some(request) if request.is_expired_at(Utc::now()) => {
                tracing::warn!(%provider, expired_at = %request.expires_at(), "Authorization expired");
                Err(FailureReason::StateMismatch)
            }
            Some(request) if request.provider != provider => {
                tracing::warn!(
                    %provider,
                    issued_for = %request.provider,
                    "Authorization issued for another provider"
                );
                Err(FailureReason::StateMismatch)
            }
            Some(_) => Ok(code),
        }
    }
}

fn adapter_failure(step: FailureReason, error: AdapterError) -> FailureReason {
    match &error {
        AdapterError::Rejected { .. } => {
            tracing::warn!(%step, error = %error, "Provider rejected the request");
            step
        }
        AdapterError::Transport { .. } if error.is_timeout() => {
            tracing::error!(%step, error = %error, "Provider call timed out");
            step
        }
        AdapterError::Transport { .. } => {
            tracing::error!(%step, error = %error, "Provider unreachable");
            FailureReason::Unknown
        }
    }
}
