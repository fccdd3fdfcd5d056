//! Identity provider adapters
//!
//! An adapter turns an authorization code into an access token and the
//! token into a [`NormalizedIdentity`]. Adapters are stateless apart from
//! their HTTP client and registration.

pub mod github;
pub mod google;

pub use github::GithubAdapter;
pub use google::GoogleAdapter;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use airwave_core::{NormalizedIdentity, Provider};

use crate::config::Config;

/// Bearer token returned by a provider's token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Why a provider call produced nothing usable
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider answered, but not with a usable token or identity
    #[error("{provider} rejected the request: {detail}")]
    Rejected { provider: Provider, detail: String },

    /// The provider could not be reached or the exchange broke off
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
}

impl AdapterError {
    pub fn rejected(provider: Provider, detail: impl Into<String>) -> Self {
        AdapterError::Rejected {
            provider,
            detail: detail.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AdapterError::Transport { source, .. } if source.is_timeout())
    }
}

/// One identity provider's half of the authorization-code flow
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Where to send the user agent to authorize, carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, airwave_core::Error>;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AdapterError>;

    /// Fetch the user's identity with an access token
    async fn fetch_identity(&self, token: &AccessToken) -> Result<NormalizedIdentity, AdapterError>;
}

/// The adapters for every configured provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every provider that has a registration in `config`
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = http_client(config.provider_timeout(), &config.user_agent)?;
        let mut registry = Self::new();

        if let Some(google) = &config.google {
            registry.register(Arc::new(GoogleAdapter::new(client.clone(), google.clone())));
        }
        if let Some(github) = &config.github {
            registry.register(Arc::new(GithubAdapter::new(client.clone(), github.clone())));
        }

        for provider in registry.providers() {
            tracing::info!(%provider, "Identity provider enabled");
        }

        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }
}

/// HTTP client for provider calls; every request is bounded by `timeout`
pub fn http_client(timeout: Duration, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

/// Decode a JSON body, treating non-success statuses and malformed bodies as rejections
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    what: &str,
    response: Response,
) -> Result<T, AdapterError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| AdapterError::Transport { provider, source })?;

    if !status.is_success() {
        return Err(AdapterError::rejected(
            provider,
            format!("{} returned HTTP {}", what, status),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| AdapterError::rejected(provider, format!("{} returned invalid JSON: {}", what, e)))
}
