//! SRV discovery over DNS

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_client::client::{AsyncClient, ClientHandle};
use hickory_client::proto::rr::{DNSClass, Name, RecordType};
use hickory_client::udp::UdpClientStream;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use airwave_core::SrvTarget;

use super::{DiscoveryError, ServiceDiscovery};

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Queries SRV records through a single resolver
pub struct DnsSrvDiscovery {
    resolver_addr: SocketAddr,
    /// Connected lazily on first lookup
    client: Mutex<Option<AsyncClient>>,
}

impl DnsSrvDiscovery {
    pub fn with_resolver_addr(addr: &str) -> Result<Self, DiscoveryError> {
        let resolver_addr: SocketAddr = addr
            .parse()
            .map_err(|e| DiscoveryError::InvalidResolver(format!("{}: {}", addr, e)))?;

        Ok(Self {
            resolver_addr,
            client: Mutex::new(None),
        })
    }

    async fn client(&self) -> Result<AsyncClient, DiscoveryError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let stream = UdpClientStream::<UdpSocket>::with_timeout(self.resolver_addr, DNS_TIMEOUT);
        let (client, bg) = AsyncClient::connect(stream)
            .await
            .map_err(|e| DiscoveryError::Query(format!("connect to {}: {}", self.resolver_addr, e)))?;
        tokio::spawn(bg);

        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl ServiceDiscovery for DnsSrvDiscovery {
    async fn discover(&self, service_name: &str) -> Result<Vec<SrvTarget>, DiscoveryError> {
        let fqdn = if service_name.ends_with('.') {
            service_name.to_string()
        } else {
            format!("{}.", service_name)
        };
        let name = Name::from_str(&fqdn).map_err(|e| DiscoveryError::InvalidName {
            name: service_name.to_string(),
            reason: e.to_string(),
        })?;

        let mut client = self.client().await?;
        let response = match client.query(name, DNSClass::IN, RecordType::SRV).await {
            Ok(response) => response,
            Err(e) => {
                // Drop the connection; the next lookup reconnects
                self.client.lock().await.take();
                return Err(DiscoveryError::Query(e.to_string()));
            }
        };

        let targets: Vec<SrvTarget> = response
            .answers()
            .iter()
            .filter_map(|record| record.data().and_then(|d| d.as_srv()))
            .map(|srv| {
                SrvTarget::new(
                    &srv.target().to_string(),
                    srv.port(),
                    srv.priority(),
                    srv.weight(),
                )
            })
            .collect();

        tracing::debug!(service = %service_name, records = targets.len(), "SRV lookup finished");
        Ok(targets)
    }
}
