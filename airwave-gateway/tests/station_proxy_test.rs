//! Tests for POST /api/modify/clicks and /api/modify/votes

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use airwave_core::{HostFilter, SrvTarget};
use airwave_gateway::upstream::DiscoveryError;
use airwave_gateway::{HostProbe, ServiceDiscovery, UpstreamResolver};
use common::{create_test_gateway_with_upstream, USER_AGENT};

const STATION: &str = "9617a958-0601-11e8-ae97-52543be04c81";

struct StaticDiscovery(Vec<SrvTarget>);

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn discover(&self, _: &str) -> Result<Vec<SrvTarget>, DiscoveryError> {
        Ok(self.0.clone())
    }
}

struct AlwaysHealthy(bool);

#[async_trait]
impl HostProbe for AlwaysHealthy {
    async fn is_healthy(&self, _: &str) -> bool {
        self.0
    }
}

async fn directory() -> (MockServer, UpstreamResolver) {
    let upstream = MockServer::start().await;
    let resolver = UpstreamResolver::pinned(format!("{}/json", upstream.uri()));
    (upstream, resolver)
}

/// Test: a click is forwarded to /url/{uuid} with the gateway's User-Agent
#[tokio::test]
async fn test_click_forwarded() {
    let (upstream, resolver) = directory().await;
    Mock::given(method("GET"))
        .and(path(format!("/json/url/{}", STATION)))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&upstream)
        .await;
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let response = gateway
        .server
        .post("/api/modify/clicks")
        .add_query_param("uuid", STATION)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
}

/// Test: a vote is forwarded to /vote/{uuid}
#[tokio::test]
async fn test_vote_forwarded() {
    let (upstream, resolver) = directory().await;
    Mock::given(method("GET"))
        .and(path(format!("/json/vote/{}", STATION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&upstream)
        .await;
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let response = gateway
        .server
        .post("/api/modify/votes")
        .add_query_param("uuid", STATION)
        .await;

    assert_eq!(response.status_code(), 200);
}

/// Test: missing or malformed uuid is a 400 and never reaches the upstream
#[tokio::test]
async fn test_bad_uuid_rejected() {
    let (upstream, resolver) = directory().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let missing = gateway.server.post("/api/modify/clicks").expect_failure().await;
    assert_eq!(missing.status_code(), 400);

    let malformed = gateway
        .server
        .post("/api/modify/votes")
        .add_query_param("uuid", "../admin")
        .expect_failure()
        .await;
    assert_eq!(malformed.status_code(), 400);
}

/// Test: an upstream error status is a 502
#[tokio::test]
async fn test_upstream_error_is_bad_gateway() {
    let (upstream, resolver) = directory().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let response = gateway
        .server
        .post("/api/modify/clicks")
        .add_query_param("uuid", STATION)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), 502);
}

/// Test: no healthy upstream is a retryable 503
#[tokio::test]
async fn test_no_upstream_is_service_unavailable() {
    let resolver = UpstreamResolver::new(
        Arc::new(StaticDiscovery(vec![SrvTarget::new("de1.example.test", 443, 1, 1)])),
        Arc::new(AlwaysHealthy(false)),
        "_api._tcp.example.test",
        HostFilter::Any,
    );
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let response = gateway
        .server
        .post("/api/modify/clicks")
        .add_query_param("uuid", STATION)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), 503);
    assert_eq!(response.header("retry-after").to_str().unwrap(), "30");
    let body: Value = response.json();
    assert_eq!(body["retryable"], true);
}

/// Test: a transport failure against the selected host drops it from the cache
#[tokio::test]
async fn test_transport_failure_invalidates_host() {
    let resolver = UpstreamResolver::new(
        Arc::new(StaticDiscovery(vec![SrvTarget::new("d1.airwave.invalid", 443, 1, 1)])),
        Arc::new(AlwaysHealthy(true)),
        "_api._tcp.airwave.invalid",
        HostFilter::Any,
    );
    let gateway = create_test_gateway_with_upstream(resolver).await;

    let response = gateway
        .server
        .post("/api/modify/clicks")
        .add_query_param("uuid", STATION)
        .expect_failure()
        .await;

    assert_eq!(response.status_code(), 502);
    assert!(gateway.state.upstream().snapshot().await.is_empty());
}
