//! Health probe for directory mirrors

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::HostProbe;

/// `GET {base}/stations?limit=1`, healthy on any 2xx within the timeout
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HostProbe for HttpProbe {
    async fn is_healthy(&self, base_url: &str) -> bool {
        let url = format!("{}/stations", base_url.trim_end_matches('/'));
        match self.client.get(&url).query(&[("limit", "1")]).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(%url, status = %response.status(), "Probe got non-success status");
                false
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "Probe request failed");
                false
            }
        }
    }
}
