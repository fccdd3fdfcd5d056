//! HTTP routes for the gateway

mod oauth;
mod session;
mod station;

pub use oauth::{SOURCE_COOKIE, STATE_COOKIE};
pub use session::SESSION_COOKIE;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::store::{IdentityStore, SessionStore};

/// Create the router with all routes
pub fn create_router<I, S>(state: Arc<AppState<I, S>>) -> Router
where
    I: IdentityStore + 'static,
    S: SessionStore + 'static,
{
    Router::new()
        .route("/auth/{provider}", get(oauth::begin))
        .route("/auth/{provider}/callback", get(oauth::callback))
        .route("/api/session", get(session::get_session_context))
        .route("/api/logout", post(session::logout))
        .route("/api/modify/clicks", post(station::record_click))
        .route("/api/modify/votes", post(station::record_vote))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new()),
        )
        .with_state(state)
}
