//! Session context and logout

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::error::GatewayError;
use crate::state::AppState;
use crate::store::{IdentityStore, Session, SessionId, SessionStore};

pub const SESSION_COOKIE: &str = "airwave_session";

#[derive(Serialize)]
pub struct SessionContext {
    pub authenticated: bool,
    pub account_id: Option<u64>,
    pub email: Option<String>,
    /// Providers linked to the account, e.g. `["Google", "Github"]`
    pub providers: Vec<String>,
    pub server_time: i64,
}

/// GET /api/session
pub async fn get_session_context<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    cookies: Cookies,
) -> Result<Json<SessionContext>, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    let server_time = chrono::Utc::now().timestamp();

    let Some(session) = get_session_from_cookies(&cookies, state.session_store.as_ref()) else {
        return Ok(Json(SessionContext {
            authenticated: false,
            account_id: None,
            email: None,
            providers: Vec::new(),
            server_time,
        }));
    };

    let account = state.identity_store.get_account(session.account_id)?;
    let providers = state
        .identity_store
        .list_links(session.account_id)?
        .into_iter()
        .map(|link| link.provider.as_str().to_string())
        .collect();

    Ok(Json(SessionContext {
        authenticated: true,
        account_id: Some(session.account_id.0),
        email: account.map(|a| a.email),
        providers,
        server_time,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// POST /api/logout
pub async fn logout<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    cookies: Cookies,
) -> Result<Json<LogoutResponse>, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    let session = get_session_from_cookies(&cookies, state.session_store.as_ref())
        .ok_or(GatewayError::NotAuthenticated)?;

    state.session_store.delete(&session.id)?;
    clear_session_cookie(&cookies, state.config.cookie_secure);

    tracing::debug!(account_id = session.account_id.0, "Logged out");
    Ok(Json(LogoutResponse { success: true }))
}

/// Look up the session named by the session cookie
pub fn get_session_from_cookies<S: SessionStore>(cookies: &Cookies, session_store: &S) -> Option<Session> {
    cookies.get(SESSION_COOKIE).and_then(|c| {
        let session_id = SessionId(c.value().to_string());
        session_store.get(&session_id).ok().flatten()
    })
}

pub fn set_session_cookie(cookies: &Cookies, session_id: &str, secure: bool) {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    cookies.add(cookie);
}

pub fn clear_session_cookie(cookies: &Cookies, secure: bool) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
