//! Tests for GET /auth/{provider}/callback

mod common;

use common::{
    begin, callback, create_test_gateway, location, mount_github, mount_google, APP_URL,
};
use airwave_gateway::IdentityStore;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn assert_flow_cookies_cleared(response: &axum_test::TestResponse) {
    for name in ["oauth_state", "oauth_req_source"] {
        let cookie = response.cookie(name);
        assert_eq!(cookie.value(), "", "{} should be emptied", name);
        assert_eq!(
            cookie.max_age(),
            Some(cookie::time::Duration::ZERO),
            "{} should expire immediately",
            name
        );
    }
}

/// Test: GitHub sign-in picks the primary verified email and creates the account
#[tokio::test]
async fn test_github_sign_in_creates_account() {
    let gateway = create_test_gateway().await;
    mount_github(
        &gateway.github,
        "abc",
        "t1",
        42,
        json!([
            { "email": "a@x.com", "primary": false, "verified": true },
            { "email": "b@x.com", "primary": true, "verified": true }
        ]),
    )
    .await;

    let begun = begin(&gateway.server, "github", Some("login")).await;
    let response = callback(&gateway.server, "github", "abc", &begun.state, &begun).await;

    assert_eq!(response.status_code(), 302);
    assert_eq!(location(&response), format!("{}/login?status=success", APP_URL));
    assert!(response.maybe_cookie("airwave_session").is_some());
    assert_flow_cookies_cleared(&response);

    let store = &gateway.state.identity_store;
    let account = store
        .get_account_by_email("b@x.com")
        .unwrap()
        .expect("account should exist");
    let link = store
        .get_link(airwave_core::Provider::Github, "42")
        .unwrap()
        .expect("link should exist");
    assert_eq!(link.account_id, account.id);
}

/// Test: Google sign-in trusts the userinfo email
#[tokio::test]
async fn test_google_sign_in_succeeds() {
    let gateway = create_test_gateway().await;
    mount_google(&gateway.google, "g-code", "g-token", "1098", "user@gmail.com").await;

    let begun = begin(&gateway.server, "google", None).await;
    let response = callback(&gateway.server, "google", "g-code", &begun.state, &begun).await;

    assert_eq!(location(&response), format!("{}/?status=success", APP_URL));
    assert!(gateway
        .state
        .identity_store
        .get_account_by_email("user@gmail.com")
        .unwrap()
        .is_some());
}

/// Test: GitHub without a primary verified email fails with user_info
#[tokio::test]
async fn test_github_without_verified_primary_fails() {
    let gateway = create_test_gateway().await;
    mount_github(
        &gateway.github,
        "abc",
        "t1",
        42,
        json!([
            { "email": "a@x.com", "primary": true, "verified": false },
            { "email": "b@x.com", "primary": false, "verified": true }
        ]),
    )
    .await;

    let begun = begin(&gateway.server, "github", Some("login")).await;
    let response = callback(&gateway.server, "github", "abc", &begun.state, &begun).await;

    assert_eq!(
        location(&response),
        format!("{}/login?status=fail&error=user_info&provider=Github", APP_URL)
    );
    assert!(response.maybe_cookie("airwave_session").is_none());
    assert_flow_cookies_cleared(&response);
    assert_eq!(gateway.state.identity_store.account_count().unwrap(), 0);
}

/// Test: a forged state never reaches the provider
#[tokio::test]
async fn test_state_mismatch_skips_provider() {
    let gateway = create_test_gateway().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway.github)
        .await;

    let begun = begin(&gateway.server, "github", Some("login")).await;
    let response = callback(&gateway.server, "github", "abc", "forged-state", &begun).await;

    assert_eq!(
        location(&response),
        format!("{}/login?status=fail&error=state_mismatch&provider=Github", APP_URL)
    );
    assert_flow_cookies_cleared(&response);
}

/// Test: presenting the first state with the second cookie fails
#[tokio::test]
async fn test_first_state_with_second_cookie_fails() {
    let gateway = create_test_gateway().await;

    let first = begin(&gateway.server, "github", None).await;
    let second = begin(&gateway.server, "github", None).await;
    let response = callback(&gateway.server, "github", "abc", &first.state, &second).await;

    assert!(location(&response).contains("error=state_mismatch"));
}

/// Test: a callback without cookies fails with state_mismatch and still clears them
#[tokio::test]
async fn test_callback_without_cookies() {
    let gateway = create_test_gateway().await;

    let response = gateway
        .server
        .get("/auth/github/callback")
        .add_query_param("code", "abc")
        .add_query_param("state", "whatever")
        .await;

    assert_eq!(response.status_code(), 302);
    assert_eq!(
        location(&response),
        format!("{}/?status=fail&error=state_mismatch&provider=Github", APP_URL)
    );
    assert_flow_cookies_cleared(&response);
}

/// Test: a provider-side denial has no code and fails with state_mismatch
#[tokio::test]
async fn test_provider_denial() {
    let gateway = create_test_gateway().await;
    let begun = begin(&gateway.server, "google", None).await;

    let response = gateway
        .server
        .get("/auth/google/callback")
        .add_query_param("error", "access_denied")
        .add_query_param("state", &begun.state)
        .add_cookie(cookie::Cookie::new("oauth_state", begun.state.clone()))
        .await;

    assert!(location(&response).contains("error=state_mismatch&provider=Google"));
}

/// Test: a state is redeemable once
#[tokio::test]
async fn test_replayed_callback_fails() {
    let gateway = create_test_gateway().await;
    mount_google(&gateway.google, "g-code", "g-token", "1098", "user@gmail.com").await;

    let begun = begin(&gateway.server, "google", None).await;
    let first = callback(&gateway.server, "google", "g-code", &begun.state, &begun).await;
    let replay = callback(&gateway.server, "google", "g-code", &begun.state, &begun).await;

    assert!(location(&first).ends_with("status=success"));
    assert!(location(&replay).contains("error=state_mismatch"));
}

/// Test: a state issued for GitHub is not accepted on the Google callback
#[tokio::test]
async fn test_state_bound_to_provider() {
    let gateway = create_test_gateway().await;

    let begun = begin(&gateway.server, "github", None).await;
    let response = callback(&gateway.server, "google", "abc", &begun.state, &begun).await;

    assert!(location(&response).contains("error=state_mismatch&provider=Google"));
}

/// Test: the token endpoint refusing the code fails with token_gen
#[tokio::test]
async fn test_token_rejection_is_token_gen() {
    let gateway = create_test_gateway().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .mount(&gateway.github)
        .await;

    let begun = begin(&gateway.server, "github", None).await;
    let response = callback(&gateway.server, "github", "stale", &begun.state, &begun).await;

    assert!(location(&response).contains("error=token_gen&provider=Github"));
}

/// Test: a failing userinfo endpoint fails with user_info
#[tokio::test]
async fn test_userinfo_failure_is_user_info() {
    let gateway = create_test_gateway().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "g-token" })))
        .mount(&gateway.google)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&gateway.google)
        .await;

    let begun = begin(&gateway.server, "google", None).await;
    let response = callback(&gateway.server, "google", "g-code", &begun.state, &begun).await;

    assert!(location(&response).contains("error=user_info&provider=Google"));
}

/// Test: unknown provider on callback is a 404 but still clears flow cookies
#[tokio::test]
async fn test_callback_unknown_provider() {
    let gateway = create_test_gateway().await;

    let response = gateway
        .server
        .get("/auth/myspace/callback")
        .add_query_param("code", "abc")
        .add_query_param("state", "s")
        .await;

    assert_eq!(response.status_code(), 404);
    assert_flow_cookies_cleared(&response);
}
