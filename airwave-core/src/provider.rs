//! Identity providers and sign-in failure codes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// An external OAuth2 / OpenID Connect identity issuer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::Github];

    /// Name stored on provider links and reported in failure redirects
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Github => "Github",
        }
    }

    /// Lowercase form used in route paths (`/auth/github`)
    pub fn slug(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    /// Scopes requested on the authorization redirect
    pub fn scopes(&self) -> &'static str {
        match self {
            Provider::Google => "openid email profile",
            Provider::Github => "read:user user:email",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownProvider(s.to_string()))
    }
}

/// Why a sign-in attempt ended in failure
///
/// The string codes are part of the redirect contract with the calling
/// application and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Missing code/state, or state not matching the one this browser was issued
    StateMismatch,
    /// The provider returned no usable access token
    TokenGen,
    /// The provider returned no usable identity or no verified email
    UserInfo,
    /// The session collaborator refused to create a session
    SessionCreation,
    /// Account or provider link could not be persisted
    DbRegistration,
    /// Anything else, including network failures talking to the provider
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::StateMismatch => "state_mismatch",
            FailureReason::TokenGen => "token_gen",
            FailureReason::UserInfo => "user_info",
            FailureReason::SessionCreation => "session_creation",
            FailureReason::DbRegistration => "db_registration",
            FailureReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("github".parse::<Provider>().unwrap(), Provider::Github);
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("GITHUB".parse::<Provider>().unwrap(), Provider::Github);
    }

    #[test]
    fn test_parse_unknown_provider() {
        let err = "facebook".parse::<Provider>().unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(name) if name == "facebook"));
    }

    #[test]
    fn test_stored_names() {
        assert_eq!(Provider::Github.to_string(), "Github");
        assert_eq!(Provider::Google.to_string(), "Google");
    }

    #[test]
    fn test_reason_codes_are_stable() {
        let codes: Vec<_> = [
            FailureReason::StateMismatch,
            FailureReason::TokenGen,
            FailureReason::UserInfo,
            FailureReason::SessionCreation,
            FailureReason::DbRegistration,
            FailureReason::Unknown,
        ]
        .iter()
        .map(FailureReason::as_str)
        .collect();

        assert_eq!(
            codes,
            [
                "state_mismatch",
                "token_gen",
                "user_info",
                "session_creation",
                "db_registration",
                "unknown"
            ]
        );
    }
}
