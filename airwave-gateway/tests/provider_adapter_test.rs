//! Tests for the Google and GitHub adapters against fake providers

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use airwave_core::Provider;
use airwave_gateway::providers::http_client;
use airwave_gateway::{
    AccessToken, AdapterError, GithubAdapter, GoogleAdapter, ProviderAdapter, ProviderConfig,
};

fn github_adapter(server: &MockServer, timeout: Duration) -> GithubAdapter {
    let config = ProviderConfig::github("gh-id", "gh-secret", "http://localhost/cb")
        .with_base_url(&server.uri());
    GithubAdapter::new(http_client(timeout, "Airwave/test").unwrap(), config)
}

fn google_adapter(server: &MockServer) -> GoogleAdapter {
    let config = ProviderConfig::google("g-id", "g-secret", "http://localhost/cb")
        .with_base_url(&server.uri());
    GoogleAdapter::new(http_client(Duration::from_secs(2), "Airwave/test").unwrap(), config)
}

mod github {
    use super::*;

    /// Test: the token exchange sends client credentials and asks for JSON
    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("client_id=gh-id"))
            .and(body_string_contains("client_secret=gh-secret"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "t1",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = github_adapter(&server, Duration::from_secs(2))
            .exchange_code("abc")
            .await
            .unwrap();
        assert_eq!(token.secret(), "t1");
    }

    /// Test: GitHub's 200-with-error token response is a rejection
    #[tokio::test]
    async fn test_exchange_code_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code"
            })))
            .mount(&server)
            .await;

        let err = github_adapter(&server, Duration::from_secs(2))
            .exchange_code("abc")
            .await
            .unwrap_err();
        match err {
            AdapterError::Rejected { provider, detail } => {
                assert_eq!(provider, Provider::Github);
                assert!(detail.contains("bad_verification_code"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    /// Test: identity uses the numeric id and the primary verified email
    #[tokio::test]
    async fn test_fetch_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "email": "a@x.com", "primary": false, "verified": true },
                { "email": "b@x.com", "primary": true, "verified": true }
            ])))
            .mount(&server)
            .await;

        let identity = github_adapter(&server, Duration::from_secs(2))
            .fetch_identity(&AccessToken::new("t1"))
            .await
            .unwrap();

        assert_eq!(identity.provider, Provider::Github);
        assert_eq!(identity.external_id, "42");
        assert_eq!(identity.verified_email.as_deref(), Some("b@x.com"));
    }

    /// Test: a slow token endpoint surfaces as a transport timeout
    #[tokio::test]
    async fn test_exchange_code_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "late" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = github_adapter(&server, Duration::from_millis(200))
            .exchange_code("abc")
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }
}

mod google {
    use super::*;

    /// Test: authorization-code grant with the registered redirect URI
    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%2Fcb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = google_adapter(&server).exchange_code("4/abc").await.unwrap();
        assert_eq!(token.secret(), "ya29.token");
    }

    /// Test: userinfo sub and email become the identity
    #[tokio::test]
    async fn test_fetch_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "110248495921238986420",
                "email": "user@gmail.com",
                "picture": "https://example.test/p.png"
            })))
            .mount(&server)
            .await;

        let identity = google_adapter(&server)
            .fetch_identity(&AccessToken::new("ya29.token"))
            .await
            .unwrap();

        assert_eq!(identity.external_id, "110248495921238986420");
        assert_eq!(identity.verified_email.as_deref(), Some("user@gmail.com"));
    }

    /// Test: malformed userinfo is a rejection
    #[tokio::test]
    async fn test_fetch_identity_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = google_adapter(&server)
            .fetch_identity(&AccessToken::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Rejected { .. }));
    }

    /// Test: access tokens never print
    #[test]
    fn test_access_token_debug_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert!(!format!("{:?}", token).contains("ya29"));
    }
}
