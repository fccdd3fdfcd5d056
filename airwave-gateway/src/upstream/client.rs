//! Calls against the selected directory upstream

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use super::UpstreamResolver;
use crate::error::GatewayError;

/// Station counters the directory lets clients bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationAction {
    /// Count a play; the directory exposes it as the station's stream URL lookup
    Click,
    Vote,
}

impl StationAction {
    pub fn path(&self) -> &'static str {
        match self {
            StationAction::Click => "url",
            StationAction::Vote => "vote",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            StationAction::Click => "Click",
            StationAction::Vote => "Vote",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StationActionResponse {
    pub success: bool,
    pub message: String,
}

pub struct DirectoryClient {
    http: Client,
    resolver: Arc<UpstreamResolver>,
}

impl DirectoryClient {
    pub fn new(http: Client, resolver: Arc<UpstreamResolver>) -> Self {
        Self { http, resolver }
    }

    pub fn resolver(&self) -> &Arc<UpstreamResolver> {
        &self.resolver
    }

    /// Bump a station counter on the upstream
    pub async fn station_action(
        &self,
        action: StationAction,
        station_uuid: &str,
    ) -> Result<StationActionResponse, GatewayError> {
        let uuid = Uuid::parse_str(station_uuid.trim())
            .map_err(|_| GatewayError::ValidationError("Invalid station UUID".to_string()))?;

        let base = self.resolver.resolve_base_host().await?;
        let url = format!("{}/{}/{}", base, action.path(), uuid);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%url, error = %e, "Directory upstream unreachable");
                self.resolver.invalidate().await;
                return Err(GatewayError::Upstream(format!("{} request failed", action.noun())));
            }
        };

        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "{} for station {} returned HTTP {}",
                action.noun(),
                uuid,
                response.status()
            )));
        }

        tracing::debug!(station = %uuid, action = action.path(), "Station counter updated");
        Ok(StationActionResponse {
            success: true,
            message: format!("{} count updated for station {}", action.noun(), uuid),
        })
    }
}
