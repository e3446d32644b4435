use crate::providers::ProviderCatalog;
use crate::session::SessionManager;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions and their pipeline tasks
    pub sessions: Arc<SessionManager>,

    /// Providers available to pipelines
    pub providers: Arc<ProviderCatalog>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, providers: Arc<ProviderCatalog>) -> Self {
        Self {
            sessions,
            providers,
        }
    }
}
