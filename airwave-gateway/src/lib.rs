//! Airwave Gateway
//!
//! Signs users in through Google and GitHub, links every provider identity
//! to one internal account, and proxies station counters to a healthy
//! mirror of the radio directory API.

pub mod config;
pub mod crypto;
pub mod error;
pub mod flow;
pub mod linker;
pub mod providers;
pub mod routes;
pub mod state;
pub mod store;
pub mod upstream;

pub use config::{Config, ProviderConfig, UpstreamConfig};
pub use error::{GatewayError, StoreError};
pub use flow::{AuthorizationRedirect, CallbackParams, FlowOutcome, OAuthFlow};
pub use linker::{AccountLinker, LinkError, LinkKind, LinkOutcome};
pub use providers::{AccessToken, AdapterError, GithubAdapter, GoogleAdapter, ProviderAdapter, ProviderRegistry};
pub use state::AppState;
pub use store::{
    IdentityStore, InMemoryIdentityStore, InMemorySessionStore, SessionStore, SqliteStore,
};
pub use upstream::{
    DirectoryClient, DnsSrvDiscovery, HostProbe, HttpProbe, ServiceDiscovery, StationAction,
    UpstreamError, UpstreamHostSet, UpstreamResolver,
};
