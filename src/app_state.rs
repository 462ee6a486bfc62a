//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::ModelRegistry;
use crate::persistence::{Authenticator, CreditLedger, RenderStore};
use crate::service::RenderService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator for all generation requests.
    pub render_service: Arc<RenderService>,
    /// Credit ledger, for the balance and transaction endpoints.
    pub ledger: Arc<dyn CreditLedger>,
    /// Render/chain/gallery store, for the read endpoints.
    pub store: Arc<dyn RenderStore>,
    /// Bearer-token resolver.
    pub authenticator: Arc<dyn Authenticator>,
    /// Static model catalog.
    pub registry: ModelRegistry,
}
