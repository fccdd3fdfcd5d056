//! Common test utilities for gateway integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use airwave_gateway::providers::http_client;
use airwave_gateway::{
    routes, AppState, Config, DirectoryClient, InMemoryIdentityStore, InMemorySessionStore,
    ProviderConfig, ProviderRegistry, UpstreamResolver,
};

pub const APP_URL: &str = "http://app.test";
pub const USER_AGENT: &str = "Airwave/test";

pub type TestState = AppState<InMemoryIdentityStore, InMemorySessionStore>;

/// A gateway wired to fake Google and GitHub servers
pub struct TestGateway {
    pub server: TestServer,
    pub state: Arc<TestState>,
    pub google: MockServer,
    pub github: MockServer,
}

/// Gateway whose directory upstream is pinned to an unroutable address
pub async fn create_test_gateway() -> TestGateway {
    create_test_gateway_with_upstream(UpstreamResolver::pinned("http://127.0.0.1:9/json")).await
}

pub async fn create_test_gateway_with_upstream(resolver: UpstreamResolver) -> TestGateway {
    create_test_gateway_with(resolver, |_| {}).await
}

/// Gateway whose config is adjusted by `configure` after the fakes are wired in
pub async fn create_test_gateway_with_config(configure: impl FnOnce(&mut Config)) -> TestGateway {
    create_test_gateway_with(UpstreamResolver::pinned("http://127.0.0.1:9/json"), configure).await
}

async fn create_test_gateway_with(
    resolver: UpstreamResolver,
    configure: impl FnOnce(&mut Config),
) -> TestGateway {
    let google = MockServer::start().await;
    let github = MockServer::start().await;

    let mut config = Config {
        app_url: APP_URL.to_string(),
        google: Some(
            ProviderConfig::google(
                "google-client",
                "google-secret",
                "http://localhost:3000/auth/google/callback",
            )
            .with_base_url(&google.uri()),
        ),
        github: Some(
            ProviderConfig::github(
                "github-client",
                "github-secret",
                "http://localhost:3000/auth/github/callback",
            )
            .with_base_url(&github.uri()),
        ),
        provider_timeout_secs: 2,
        user_agent: USER_AGENT.to_string(),
        ..Config::default()
    };
    configure(&mut config);

    let providers = ProviderRegistry::from_config(&config).expect("Failed to build providers");
    let directory = DirectoryClient::new(
        http_client(Duration::from_secs(2), USER_AGENT).expect("Failed to build HTTP client"),
        Arc::new(resolver),
    );

    let state = Arc::new(AppState::new(
        config,
        InMemoryIdentityStore::new(),
        InMemorySessionStore::new(),
        providers,
        directory,
    ));

    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    TestGateway {
        server,
        state,
        google,
        github,
    }
}

/// Fake GitHub: token exchange for `code`, profile `{id}`, and an emails list
pub async fn mount_github(idp: &MockServer, code: &str, token: &str, user_id: u64, emails: Value) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("accept", "application/json"))
        .and(body_string_contains(format!("code={}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "scope": "read:user,user:email"
        })))
        .mount(idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", format!("Bearer {}", token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "login": "octocat"
        })))
        .mount(idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .and(header("authorization", format!("Bearer {}", token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(emails))
        .mount(idp)
        .await;
}

/// Fake Google: token exchange for `code` and an OIDC userinfo document
pub async fn mount_google(idp: &MockServer, code: &str, token: &str, sub: &str, email: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3599,
            "scope": "openid email profile"
        })))
        .mount(idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", format!("Bearer {}", token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": sub,
            "email": email,
            "name": "Test User"
        })))
        .mount(idp)
        .await;
}

/// Cookies and redirect handed out by `GET /auth/{provider}`
pub struct Begun {
    pub state: String,
    pub source: String,
    pub location: String,
}

pub async fn begin(server: &TestServer, provider: &str, source: Option<&str>) -> Begun {
    let url = match source {
        Some(source) => format!("/auth/{}?source={}", provider, source),
        None => format!("/auth/{}", provider),
    };
    let response = server.get(&url).await;
    assert_eq!(response.status_code(), 302);

    Begun {
        state: response.cookie("oauth_state").value().to_string(),
        source: response.cookie("oauth_req_source").value().to_string(),
        location: location(&response),
    }
}

/// Provider redirect back to the gateway, presenting `begun`'s cookies
pub async fn callback(
    server: &TestServer,
    provider: &str,
    code: &str,
    state: &str,
    begun: &Begun,
) -> TestResponse {
    server
        .get(&format!("/auth/{}/callback", provider))
        .add_query_param("code", code)
        .add_query_param("state", state)
        .add_cookie(cookie::Cookie::new("oauth_state", begun.state.clone()))
        .add_cookie(cookie::Cookie::new("oauth_req_source", begun.source.clone()))
        .await
}

/// Full sign-in; returns the callback response
pub async fn sign_in(server: &TestServer, provider: &str, code: &str) -> TestResponse {
    let begun = begin(server, provider, None).await;
    callback(server, provider, code, &begun.state, &begun).await
}

pub fn location(response: &TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .expect("Location is not ASCII")
        .to_string()
}

/// Session cookie value set by a successful callback
pub fn session_cookie(response: &TestResponse) -> String {
    response
        .maybe_cookie("airwave_session")
        .expect("No session cookie")
        .value()
        .to_string()
}
