//! Provider payloads and identity normalization
//!
//! Each provider describes its users differently. The gateway only ever
//! works with a [`NormalizedIdentity`]: the provider, the provider's stable
//! user id, and an email address the provider vouches for.

use serde::{Deserialize, Serialize};

use crate::{Error, Provider, Result};

/// Provider-agnostic identity produced after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
    pub provider: Provider,
    /// The provider's stable id for the user (`sub` for Google, numeric `id` for GitHub)
    pub external_id: String,
    /// An email the provider has verified, if one could be determined
    pub verified_email: Option<String>,
}

impl NormalizedIdentity {
    /// Build an identity from Google's OpenID Connect userinfo payload
    ///
    /// Google's email claim is issued under OIDC and is trusted as verified.
    pub fn from_google(info: &GoogleUserInfo) -> Result<Self> {
        let external_id = info.sub.trim();
        if external_id.is_empty() {
            return Err(Error::IncompleteIdentity {
                provider: Provider::Google.to_string(),
                reason: "missing sub claim".to_string(),
            });
        }

        Ok(Self {
            provider: Provider::Google,
            external_id: external_id.to_string(),
            verified_email: non_empty(info.email.as_deref()),
        })
    }

    /// Build an identity from GitHub's user profile and emails list
    ///
    /// The profile's own email field is unreliable, so the verified email is
    /// always taken from the emails list.
    pub fn from_github(user: &GithubUser, emails: &[GithubEmail]) -> Self {
        Self {
            provider: Provider::Github,
            external_id: user.id.to_string(),
            verified_email: select_primary_email(emails).map(str::to_string),
        }
    }

    pub fn has_verified_email(&self) -> bool {
        self.verified_email.is_some()
    }
}

/// Token endpoint response shared by Google and GitHub
///
/// Both providers answer error conditions with a 200 and an `error` field in
/// some cases, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// The access token, if the response actually carries one
    pub fn usable_token(&self) -> Option<&str> {
        non_empty_ref(self.access_token.as_deref())
    }

    /// Human-readable explanation for a response without a usable token
    pub fn failure_detail(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(error), Some(description)) => format!("{}: {}", error, description),
            (Some(error), None) => error.clone(),
            _ => "token response carried no access_token".to_string(),
        }
    }
}

/// Google OpenID Connect userinfo response
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// GitHub `/user` response (only the fields we use)
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub id: u64,
    #[serde(default)]
    pub login: Option<String>,
}

/// One entry of GitHub's `/user/emails` response
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// First email that is both primary and verified
pub fn select_primary_email(emails: &[GithubEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .and_then(|e| non_empty_ref(Some(e.email.as_str())))
}

fn non_empty_ref(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    non_empty_ref(value).map(str::to_string)
}
