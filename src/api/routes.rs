//! Router assembly: one line per endpoint in spec §6, plus the supplemented
//! CRUD surface from SPEC_FULL.md §3.

use super::{handlers, AppState};
use crate::middleware::{request_id_middleware, request_logging_simple};
use axum::middleware::from_fn;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/snapshots/generate", post(handlers::generate_snapshots))
        .route("/reports/daily", get(handlers::daily_report))
        .route("/trading-calendar/check", get(handlers::calendar_check))
        .route("/trading-calendar/refresh", post(handlers::calendar_refresh))
        .route("/providers/health", get(handlers::providers_health))
        .route("/providers/capabilities", get(handlers::providers_capabilities))
        .route("/providers/reset", post(handlers::providers_reset))
        .route("/providers/reset-all", post(handlers::providers_reset_all))
        .route("/stocks/symbol/:symbol/update-price", get(handlers::update_price))
        .route("/stocks/symbol/:symbol/clear-cache-and-refresh", post(handlers::clear_cache_and_refresh))
        .route("/stocks/symbol/:symbol/financial-report", get(handlers::financial_report))
        .route("/stocks/symbol/:symbol/valuation-metrics", get(handlers::valuation_metrics))
        .route("/macro-indicators", get(handlers::macro_indicators))
        .route("/stocks", post(handlers::create_stock).get(handlers::list_stocks))
        .route("/stocks/:id", get(handlers::get_stock).delete(handlers::delete_stock))
        .route("/stocks/:id/charts", get(handlers::stock_charts))
        .route("/stocks/batch-delete", post(handlers::batch_delete_stocks))
        .route("/stocks/batch-assign-groups", post(handlers::batch_assign_groups))
        .route("/stocks/batch-remove-from-group", post(handlers::batch_remove_from_group))
        .route("/groups", post(handlers::create_group).get(handlers::list_groups))
        .route("/groups/:id", delete(handlers::delete_group))
        .layer(from_fn(request_logging_simple))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
