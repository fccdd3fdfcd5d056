//! Redirect targets for the calling application

use std::fmt;

use url::Url;

use crate::{FailureReason, Provider, Result};

/// Relative path under the application URL to return the user to
///
/// Supplied by the caller when sign-in starts (`?source=login`). Only plain
/// relative paths are kept; anything that could escape the application
/// origin or smuggle query parameters collapses to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnSource(String);

impl ReturnSource {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::default();
        };

        if raw.starts_with("//") {
            return Self::default();
        }
        let path = raw.strip_prefix('/').unwrap_or(raw);

        let allowed = path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '~'));
        let traverses = path.split('/').any(|segment| segment == "..");

        if allowed && !traverses {
            Self(path.to_string())
        } else {
            Self::default()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReturnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{app_url}/{source}?status=success`
pub fn success_url(app_url: &str, source: &ReturnSource) -> String {
    format!("{}?status=success", return_base(app_url, source))
}

/// `{app_url}/{source}?status=fail&error={reason}&provider={provider}`
pub fn failure_url(
    app_url: &str,
    source: &ReturnSource,
    reason: FailureReason,
    provider: Provider,
) -> String {
    format!(
        "{}?status=fail&error={}&provider={}",
        return_base(app_url, source),
        reason.as_str(),
        provider.as_str()
    )
}

/// Provider authorization URL with the standard authorization-code parameters
pub fn authorization_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        authorize_endpoint,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope),
            ("state", state),
        ],
    )?;
    Ok(url.to_string())
}

fn return_base(app_url: &str, source: &ReturnSource) -> String {
    format!("{}/{}", app_url.trim_end_matches('/'), source.as_str())
}
