//! Airwave Gateway
//!
//! OAuth sign-in and radio directory proxy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airwave_gateway::providers::http_client;
use airwave_gateway::{
    routes, AppState, Config, DirectoryClient, IdentityStore, InMemoryIdentityStore,
    InMemorySessionStore, ProviderRegistry, SessionStore, SqliteStore, UpstreamResolver,
};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airwave_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    let providers = ProviderRegistry::from_config(&config)?;
    if providers.providers().is_empty() {
        tracing::warn!("No identity providers configured; sign-in is disabled");
    }

    let resolver = Arc::new(UpstreamResolver::from_config(&config.upstream, &config.user_agent)?);
    let directory = DirectoryClient::new(
        http_client(config.provider_timeout(), &config.user_agent)?,
        resolver,
    );

    match config.database_path.clone() {
        Some(path) => {
            // One connection serves both identity and session tables
            let store = SqliteStore::open(&path)?;
            tracing::info!(%path, "Using SQLite storage");
            serve(config, store.clone(), store, providers, directory).await
        }
        None => {
            tracing::info!("Using in-memory storage");
            serve(
                config,
                InMemoryIdentityStore::new(),
                InMemorySessionStore::new(),
                providers,
                directory,
            )
            .await
        }
    }
}

async fn serve<I, S>(
    config: Config,
    identity_store: I,
    session_store: S,
    providers: ProviderRegistry,
    directory: DirectoryClient,
) -> Result<()>
where
    I: IdentityStore + 'static,
    S: SessionStore + 'static,
{
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(
        config,
        identity_store,
        session_store,
        providers,
        directory,
    ));

    let identity_store = state.identity_store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match identity_store.cleanup_expired_authorizations() {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Purged expired authorization requests"),
                Err(e) => tracing::error!(error = %e, "Authorization cleanup failed"),
            }
        }
    });

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
