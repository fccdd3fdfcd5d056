//! Gateway configuration
//!
//! Everything is read from the environment. Providers without a client id
//! are left disabled.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use airwave_core::upstream::{DEFAULT_HOST_PREFIX, DEFAULT_SERVICE_NAME};
use airwave_core::{HostFilter, Provider};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USER_INFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_INFO_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Base URL of the calling application; sign-in results redirect here
    pub app_url: String,

    /// Mark flow and session cookies `Secure`
    pub cookie_secure: bool,

    /// SQLite database path; in-memory stores when unset
    pub database_path: Option<String>,

    pub google: Option<ProviderConfig>,
    pub github: Option<ProviderConfig>,

    /// Bound on every call to an identity provider
    pub provider_timeout_secs: u64,

    /// Sent on every outbound request
    pub user_agent: String,

    pub upstream: UpstreamConfig,
}

/// OAuth client registration for one provider
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub user_info_url: String,
    /// GitHub only: the emails endpoint
    pub emails_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// SRV name listing the directory servers
    pub srv_name: String,
    /// Keep only hosts starting with this prefix; `None` keeps all
    pub host_prefix: Option<String>,
    pub probe_timeout_secs: u64,
    /// DNS resolver used for SRV lookups
    pub dns_resolver: String,
    /// Fixed directory base URL; skips SRV discovery when set
    pub base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT", defaults.port),
            app_url: env_or("APP_URL", &defaults.app_url),
            cookie_secure: env_parse("COOKIE_SECURE", defaults.cookie_secure),
            database_path: env_opt("DATABASE_PATH"),
            google: ProviderConfig::from_env(Provider::Google),
            github: ProviderConfig::from_env(Provider::Github),
            provider_timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout_secs),
            user_agent: env_or("USER_AGENT", &defaults.user_agent),
            upstream: UpstreamConfig::from_env(),
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            app_url: "http://localhost:3000".to_string(),
            cookie_secure: false,
            database_path: None,
            google: None,
            github: None,
            provider_timeout_secs: 10,
            user_agent: "Airwave/1.0".to_string(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Read `<PROVIDER>_OAUTH_*` variables; `None` unless id, secret and redirect URI are all set
    pub fn from_env(provider: Provider) -> Option<Self> {
        let prefix = provider.as_str().to_ascii_uppercase();
        let var = |suffix: &str| format!("{}_OAUTH_{}", prefix, suffix);

        let client_id = env_opt(&var("CLIENT_ID"))?;
        let client_secret = env_opt(&var("SECRET"))?;
        let redirect_uri = env_opt(&var("REDIRECT_URI"))?;

        let mut config = match provider {
            Provider::Google => Self::google(client_id, client_secret, redirect_uri),
            Provider::Github => Self::github(client_id, client_secret, redirect_uri),
        };
        if let Some(url) = env_opt(&var("URI")) {
            config.authorize_url = url;
        }
        if let Some(url) = env_opt(&var("TOKEN_URI")) {
            config.token_url = url;
        }
        if let Some(url) = env_opt(&var("USER_INFO_URI")) {
            config.user_info_url = url;
        }
        if let Some(url) = env_opt(&var("EMAILS_URI")) {
            config.emails_url = Some(url);
        }
        Some(config)
    }

    /// Google registration against Google's public endpoints
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            user_info_url: GOOGLE_USER_INFO_URL.to_string(),
            emails_url: None,
        }
    }

    /// GitHub registration against GitHub's public endpoints
    pub fn github(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: GITHUB_AUTHORIZE_URL.to_string(),
            token_url: GITHUB_TOKEN_URL.to_string(),
            user_info_url: GITHUB_USER_INFO_URL.to_string(),
            emails_url: Some(GITHUB_EMAILS_URL.to_string()),
        }
    }

    /// Point every provider endpoint at `base` (used against local fakes)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.authorize_url = format!("{}/authorize", base);
        self.token_url = format!("{}/token", base);
        self.user_info_url = format!("{}/user", base);
        if self.emails_url.is_some() {
            self.emails_url = Some(format!("{}/user/emails", base));
        }
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("user_info_url", &self.user_info_url)
            .field("emails_url", &self.emails_url)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            srv_name: env_or("UPSTREAM_SRV_NAME", &defaults.srv_name),
            // An explicitly empty prefix disables filtering
            host_prefix: match std::env::var("UPSTREAM_HOST_PREFIX") {
                Ok(prefix) => Some(prefix),
                Err(_) => defaults.host_prefix,
            },
            probe_timeout_secs: env_parse("UPSTREAM_PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            dns_resolver: env_or("DNS_RESOLVER", &defaults.dns_resolver),
            base_url: env_opt("UPSTREAM_BASE_URL"),
        }
    }

    pub fn host_filter(&self) -> HostFilter {
        HostFilter::from_prefix(self.host_prefix.as_deref())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            srv_name: DEFAULT_SERVICE_NAME.to_string(),
            host_prefix: Some(DEFAULT_HOST_PREFIX.to_string()),
            probe_timeout_secs: 3,
            dns_resolver: "8.8.8.8:53".to_string(),
            base_url: None,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
            default
        }),
        None => default,
    }
}
