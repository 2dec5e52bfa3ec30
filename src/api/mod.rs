//! HTTP façade over the pipeline core — a collaborator, not part of the
//! core's own budget. Thin handlers that validate at the boundary and defer
//! everything else to `enrichment`/`snapshot`/`report`/`calendar`.

pub mod handlers;
pub mod routes;

use crate::cache::Caches;
use crate::calendar::TradingCalendar;
use crate::providers::coordinator::Coordinator;
use crate::storage::Db;
use std::sync::Arc;

pub use routes::build_router;

/// Shared state handed to every handler via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub coordinator: Arc<Coordinator>,
    pub calendar: Arc<TradingCalendar>,
    pub caches: Arc<Caches>,
    pub batch_pool_size: usize,
}
