//! OAuth sign-in endpoints
//!
//! Both endpoints answer with a `302` for any known provider slug; failures
//! land on the application's failure URL. The callback always clears the
//! flow cookies, whatever the outcome.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use airwave_core::redirect::{failure_url, success_url};
use airwave_core::{FailureReason, Provider, ReturnSource};

use crate::error::GatewayError;
use crate::flow::{CallbackParams, FlowOutcome};
use crate::state::AppState;
use crate::store::{IdentityStore, SessionStore, AUTHORIZATION_TTL_MINUTES};

pub const STATE_COOKIE: &str = "oauth_state";
pub const SOURCE_COOKIE: &str = "oauth_req_source";

#[derive(Deserialize)]
pub struct BeginQuery {
    pub source: Option<String>,
}

/// GET /auth/{provider}?source=
pub async fn begin<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    Path(provider): Path<String>,
    Query(query): Query<BeginQuery>,
    cookies: Cookies,
) -> Result<Response, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    let provider = parse_provider(&provider)?;
    let source = ReturnSource::parse(query.source.as_deref());

    let redirect = match state.flow.begin(provider, source.clone()) {
        Ok(redirect) => redirect,
        Err(e) => {
            tracing::error!(%provider, error = %e, "Failed to start authorization");
            return Ok(found(failure_url(
                &state.config.app_url,
                &source,
                FailureReason::Unknown,
                provider,
            )));
        }
    };

    let secure = state.config.cookie_secure;
    cookies.add(flow_cookie(STATE_COOKIE, redirect.state, secure));
    cookies.add(flow_cookie(
        SOURCE_COOKIE,
        redirect.return_source.as_str().to_string(),
        secure,
    ));

    Ok(found(redirect.location))
}

/// GET /auth/{provider}/callback?code=&state=
pub async fn callback<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    cookies: Cookies,
) -> Result<Response, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    let stored_state = cookies.get(STATE_COOKIE).map(|c| c.value().to_string());
    let source_cookie = cookies.get(SOURCE_COOKIE).map(|c| c.value().to_string());
    let secure = state.config.cookie_secure;
    clear_flow_cookies(&cookies, secure);

    let provider = parse_provider(&provider)?;
    let source = ReturnSource::parse(source_cookie.as_deref());

    let location = match state
        .flow
        .complete(provider, &params, stored_state.as_deref())
        .await
    {
        FlowOutcome::Success { session_id, .. } => {
            super::session::set_session_cookie(&cookies, &session_id.0, secure);
            success_url(&state.config.app_url, &source)
        }
        FlowOutcome::Fail { reason } => {
            failure_url(&state.config.app_url, &source, reason, provider)
        }
    };

    Ok(found(location))
}

fn parse_provider(raw: &str) -> Result<Provider, GatewayError> {
    raw.parse()
        .map_err(|_| GatewayError::UnknownProvider(raw.to_string()))
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn flow_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::minutes(AUTHORIZATION_TTL_MINUTES))
        .build()
}

fn clear_flow_cookies(cookies: &Cookies, secure: bool) {
    for name in [STATE_COOKIE, SOURCE_COOKIE] {
        let cookie = Cookie::build((name, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(Duration::ZERO)
            .build();
        cookies.add(cookie);
    }
}
