use std::sync::Arc;

use cadence_store::{ApprovalRepo, ChangeRequestRepo, EventStore, SeriesManager};

use crate::config::ServerConfig;
use crate::guard::AccessGuard;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Versioned event store, the single source of truth.
    pub store: Arc<EventStore>,
    /// Atomic multi-day series operations on top of the store.
    pub series: Arc<SeriesManager>,
    /// Monthly approval records.
    pub approvals: Arc<ApprovalRepo>,
    /// Append-only client change requests.
    pub change_requests: Arc<ChangeRequestRepo>,
    /// Rate limiter for the public review-page routes.
    pub guard: Arc<AccessGuard>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire a complete engine around the given store.
    pub fn new(store: Arc<EventStore>, config: ServerConfig) -> Self {
        let approvals = Arc::new(ApprovalRepo::new());
        let change_requests = Arc::new(ChangeRequestRepo::new(Arc::clone(&approvals)));
        let guard = Arc::new(AccessGuard::new(config.guard.clone()));
        Self {
            series: Arc::new(SeriesManager::new(Arc::clone(&store))),
            store,
            approvals,
            change_requests,
            guard,
            config: Arc::new(config),
        }
    }
}
