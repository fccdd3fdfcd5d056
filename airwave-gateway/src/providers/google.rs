//! Google OpenID Connect adapter

use async_trait::async_trait;
use reqwest::Client;

use airwave_core::identity::{GoogleUserInfo, TokenResponse};
use airwave_core::redirect::authorization_url;
use airwave_core::{NormalizedIdentity, Provider};

use super::{read_json, AccessToken, AdapterError, ProviderAdapter};
use crate::config::ProviderConfig;

const PROVIDER: Provider = Provider::Google;

pub struct GoogleAdapter {
    client: Client,
    config: ProviderConfig,
}

impl GoogleAdapter {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn authorization_url(&self, state: &str) -> Result<String, airwave_core::Error> {
        authorization_url(
            &self.config.authorize_url,
            &self.config.client_id,
            &self.config.redirect_uri,
            PROVIDER.scopes(),
            state,
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AdapterError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|source| AdapterError::Transport { provider: PROVIDER, source })?;

        let token: TokenResponse = read_json(PROVIDER, "token endpoint", response).await?;
        token
            .usable_token()
            .map(AccessToken::new)
            .ok_or_else(|| AdapterError::rejected(PROVIDER, token.failure_detail()))
    }

    async fn fetch_identity(&self, token: &AccessToken) -> Result<NormalizedIdentity, AdapterError> {
        let response = self
            .client
            .get(&self.config.user_info_url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|source| AdapterError::Transport { provider: PROVIDER, source })?;

        let info: GoogleUserInfo = read_json(PROVIDER, "userinfo endpoint", response).await?;
        NormalizedIdentity::from_google(&info)
            .map_err(|e| AdapterError::rejected(PROVIDER, e.to_string()))
    }
}
