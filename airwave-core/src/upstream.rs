//! Directory upstream candidates
//!
//! The radio directory publishes its API servers as SRV records under
//! `_api._tcp.radio-browser.info`. Each target becomes a base URL of the
//! form `https://<target>/json`.

use serde::{Deserialize, Serialize};

/// Default service name queried for directory servers
pub const DEFAULT_SERVICE_NAME: &str = "_api._tcp.radio-browser.info";

/// Default host-name prefix kept after discovery
pub const DEFAULT_HOST_PREFIX: &str = "d";

/// One SRV answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrvTarget {
    /// Target host name, lowercase, without the trailing root dot
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

impl SrvTarget {
    pub fn new(target: &str, port: u16, priority: u16, weight: u16) -> Self {
        Self {
            target: target.trim_end_matches('.').to_ascii_lowercase(),
            port,
            priority,
            weight,
        }
    }

    /// Base URL for directory API requests against this target
    pub fn base_url(&self) -> String {
        format!("https://{}/json", self.target)
    }
}

/// Which discovered hosts are worth probing
///
/// Only some regions of the directory have been reliable, so deployments
/// can narrow candidates by name prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostFilter {
    #[default]
    Any,
    Prefix(String),
}

impl HostFilter {
    /// `None` or an empty prefix accepts every host
    pub fn from_prefix(prefix: Option<&str>) -> Self {
        match prefix.map(str::trim) {
            Some(p) if !p.is_empty() => HostFilter::Prefix(p.to_ascii_lowercase()),
            _ => HostFilter::Any,
        }
    }

    pub fn accepts(&self, host: &str) -> bool {
        match self {
            HostFilter::Any => true,
            HostFilter::Prefix(prefix) => host.to_ascii_lowercase().starts_with(prefix.as_str()),
        }
    }
}

/// Filtered, de-duplicated base URLs in a stable order
pub fn candidate_base_urls(targets: &[SrvTarget], filter: &HostFilter) -> Vec<String> {
    let mut kept: Vec<&SrvTarget> = targets
        .iter()
        .filter(|t| !t.target.is_empty() && filter.accepts(&t.target))
        .collect();
    kept.sort_unstable_by(|a, b| a.target.cmp(&b.target));
    kept.dedup_by(|a, b| a.target == b.target);

    kept.into_iter().map(SrvTarget::base_url).collect()
}
