//! GitHub OAuth adapter
//!
//! GitHub's profile email is often empty or unverified, so the identity
//! needs a second call to the emails endpoint.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;

use airwave_core::identity::{GithubEmail, GithubUser, TokenResponse};
use airwave_core::redirect::authorization_url;
use airwave_core::{NormalizedIdentity, Provider};

use super::{read_json, AccessToken, AdapterError, ProviderAdapter};
use crate::config::ProviderConfig;

const PROVIDER: Provider = Provider::Github;
const GITHUB_JSON: &str = "application/vnd.github+json";

pub struct GithubAdapter {
    client: Client,
    config: ProviderConfig,
}

impl GithubAdapter {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        what: &str,
        token: &AccessToken,
    ) -> Result<T, AdapterError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, GITHUB_JSON)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|source| AdapterError::Transport { provider: PROVIDER, source })?;

        read_json(PROVIDER, what, response).await
    }
}

#[async_trait]
impl ProviderAdapter for GithubAdapter {
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
        // Without the Accept header GitHub answers form-encoded
        let response = self
            .client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
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
        let emails_url = self
            .config
            .emails_url
            .as_deref()
            .ok_or_else(|| AdapterError::rejected(PROVIDER, "emails endpoint not configured"))?;

        let user: GithubUser = self
            .get_json(&self.config.user_info_url, "user endpoint", token)
            .await?;
        let emails: Vec<GithubEmail> = self.get_json(emails_url, "emails endpoint", token).await?;

        let identity = NormalizedIdentity::from_github(&user, &emails);
        if !identity.has_verified_email() {
            return Err(AdapterError::rejected(
                PROVIDER,
                format!("user {} has no primary verified email", identity.external_id),
            ));
        }

        Ok(identity)
    }
}
