//! Station counter proxy

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::state::AppState;
use crate::store::{IdentityStore, SessionStore};
use crate::upstream::client::StationActionResponse;
use crate::upstream::StationAction;

#[derive(Deserialize)]
pub struct StationQuery {
    pub uuid: Option<String>,
}

/// POST /api/modify/clicks?uuid=
pub async fn record_click<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    Query(query): Query<StationQuery>,
) -> Result<Json<StationActionResponse>, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    station_action(&state, StationAction::Click, query).await
}

/// POST /api/modify/votes?uuid=
pub async fn record_vote<I, S>(
    State(state): State<Arc<AppState<I, S>>>,
    Query(query): Query<StationQuery>,
) -> Result<Json<StationActionResponse>, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    station_action(&state, StationAction::Vote, query).await
}

async fn station_action<I, S>(
    state: &AppState<I, S>,
    action: StationAction,
    query: StationQuery,
) -> Result<Json<StationActionResponse>, GatewayError>
where
    I: IdentityStore,
    S: SessionStore,
{
    let uuid = query
        .uuid
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| GatewayError::ValidationError("Station UUID missing".to_string()))?;

    let response = state.directory.station_action(action, &uuid).await?;
    Ok(Json(response))
}
