//! Directory upstream selection
//!
//! The directory API is served by a pool of mirrors listed in DNS SRV
//! records. The resolver discovers them, keeps the ones that pass a health
//! probe, and sticks to one at random until it is invalidated.

pub mod client;
pub mod dns;
pub mod probe;

pub use client::{DirectoryClient, StationAction};
pub use dns::DnsSrvDiscovery;
pub use probe::HttpProbe;

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::sync::RwLock;

use airwave_core::upstream::candidate_base_urls;
use airwave_core::{HostFilter, SrvTarget};

use crate::config::UpstreamConfig;
use crate::error::GatewayError;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid resolver address: {0}")]
    InvalidResolver(String),

    #[error("Invalid service name {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("DNS query failed: {0}")]
    Query(String),

    #[error("Probe client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("No healthy upstream host")]
    NoUpstreamAvailable,
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NoUpstreamAvailable => GatewayError::NoUpstreamAvailable,
        }
    }
}

/// Source of candidate hosts
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn discover(&self, service_name: &str) -> Result<Vec<SrvTarget>, DiscoveryError>;
}

/// Liveness check for one candidate base URL
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn is_healthy(&self, base_url: &str) -> bool;
}

/// Healthy candidates and the host every request is sent to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamHostSet {
    pub healthy: Vec<String>,
    pub selected: Option<String>,
}

impl UpstreamHostSet {
    pub fn is_empty(&self) -> bool {
        self.selected.is_none()
    }
}

pub struct UpstreamResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    probe: Arc<dyn HostProbe>,
    service_name: String,
    filter: HostFilter,
    /// Fixed base URL that bypasses discovery
    pinned: Option<String>,
    cache: RwLock<UpstreamHostSet>,
}

impl UpstreamResolver {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        probe: Arc<dyn HostProbe>,
        service_name: impl Into<String>,
        filter: HostFilter,
    ) -> Self {
        Self {
            discovery,
            probe,
            service_name: service_name.into(),
            filter,
            pinned: None,
            cache: RwLock::new(UpstreamHostSet::default()),
        }
    }

    /// Resolver that always answers with `base_url`
    pub fn pinned(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            discovery: Arc::new(NoDiscovery),
            probe: Arc::new(NoProbe),
            service_name: String::new(),
            filter: HostFilter::Any,
            cache: RwLock::new(UpstreamHostSet {
                healthy: vec![base_url.clone()],
                selected: Some(base_url.clone()),
            }),
            pinned: Some(base_url),
        }
    }

    /// Resolver backed by real DNS and HTTP probes
    pub fn from_config(config: &UpstreamConfig, user_agent: &str) -> Result<Self, DiscoveryError> {
        if let Some(base_url) = &config.base_url {
            tracing::info!(%base_url, "Directory upstream pinned, skipping discovery");
            return Ok(Self::pinned(base_url.clone()));
        }

        let discovery = DnsSrvDiscovery::with_resolver_addr(&config.dns_resolver)?;
        let probe = HttpProbe::new(config.probe_timeout(), user_agent)?;
        Ok(Self::new(
            Arc::new(discovery),
            Arc::new(probe),
            config.srv_name.clone(),
            config.host_filter(),
        ))
    }

    /// Base URL of the directory API, discovering one if nothing is cached
    pub async fn resolve_base_host(&self) -> Result<String, UpstreamError> {
        if let Some(host) = self.cache.read().await.selected.clone() {
            return Ok(host);
        }

        let healthy = self.discover_healthy().await?;
        let pick = pick_random(&healthy).ok_or(UpstreamError::NoUpstreamAvailable)?;

        let mut cache = self.cache.write().await;
        // Another request may have populated the cache while we probed
        if let Some(existing) = &cache.selected {
            return Ok(existing.clone());
        }

        tracing::info!(host = %pick, healthy = healthy.len(), "Selected directory upstream");
        cache.healthy = healthy;
        cache.selected = Some(pick.clone());
        Ok(pick)
    }

    /// Forget the cached host so the next call re-discovers
    pub async fn invalidate(&self) {
        if self.pinned.is_some() {
            return;
        }
        let mut cache = self.cache.write().await;
        if let Some(host) = cache.selected.take() {
            tracing::warn!(%host, "Invalidated directory upstream");
        }
        cache.healthy.clear();
    }

    /// Drop the cache and resolve again
    pub async fn refresh(&self) -> Result<String, UpstreamError> {
        self.invalidate().await;
        self.resolve_base_host().await
    }

    pub async fn snapshot(&self) -> UpstreamHostSet {
        self.cache.read().await.clone()
    }

    async fn discover_healthy(&self) -> Result<Vec<String>, UpstreamError> {
        let targets = self
            .discovery
            .discover(&self.service_name)
            .await
            .map_err(|e| {
                tracing::warn!(service = %self.service_name, error = %e, "Upstream discovery failed");
                UpstreamError::NoUpstreamAvailable
            })?;

        let candidates = candidate_base_urls(&targets, &self.filter);
        tracing::debug!(
            discovered = targets.len(),
            candidates = candidates.len(),
            "Probing directory candidates"
        );

        let mut healthy = Vec::with_capacity(candidates.len());
        for base in candidates {
            if self.probe.is_healthy(&base).await {
                healthy.push(base);
            } else {
                tracing::debug!(%base, "Candidate failed health probe");
            }
        }

        if healthy.is_empty() {
            tracing::warn!(service = %self.service_name, "No healthy directory upstream");
            return Err(UpstreamError::NoUpstreamAvailable);
        }
        Ok(healthy)
    }
}

struct NoDiscovery;

#[async_trait]
impl ServiceDiscovery for NoDiscovery {
    async fn discover(&self, _: &str) -> Result<Vec<SrvTarget>, DiscoveryError> {
        Ok(Vec::new())
    }
}

struct NoProbe;

#[async_trait]
impl HostProbe for NoProbe {
    async fn is_healthy(&self, _: &str) -> bool {
        false
    }
}

fn pick_random(hosts: &[String]) -> Option<String> {
    hosts.choose(&mut rand::thread_rng()).cloned()
}
