//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::flow::OAuthFlow;
use crate::providers::ProviderRegistry;
use crate::store::{IdentityStore, SessionStore};
use crate::upstream::{DirectoryClient, UpstreamResolver};

/// Gateway state handed to every route
pub struct AppState<I: IdentityStore, S: SessionStore> {
    pub config: Config,
    pub identity_store: Arc<I>,
    pub session_store: Arc<S>,
    pub flow: OAuthFlow<I, S>,
    pub directory: DirectoryClient,
}

impl<I: IdentityStore, S: SessionStore> AppState<I, S> {
    pub fn new(
        config: Config,
        identity_store: I,
        session_store: S,
        providers: ProviderRegistry,
        directory: DirectoryClient,
    ) -> Self {
        let identity_store = Arc::new(identity_store);
        let session_store = Arc::new(session_store);
        Self {
            flow: OAuthFlow::new(identity_store.clone(), session_store.clone(), providers),
            config,
            identity_store,
            session_store,
            directory,
        }
    }

    pub fn upstream(&self) -> &Arc<UpstreamResolver> {
        self.directory.resolver()
    }
}
