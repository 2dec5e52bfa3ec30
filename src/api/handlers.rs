//! Request handlers. Each one validates at the HTTP boundary (non-trading-day
//! and before-close rejections per spec §6) and otherwise just calls into
//! the pipeline modules and maps their errors to status codes.

use super::AppState;
use crate::calendar::CalendarLookup;
use crate::enrichment;
use crate::models::Instrument;
use crate::report;
use crate::snapshot;
use crate::storage::stocks::StockFilter;
use crate::symbol;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{NaiveDate, NaiveTime, Utc};
use chrono_tz::Asia::Shanghai;
use serde::{Deserialize, Serialize};

/// Shape mandated by §6 for non-trading-day / before-close rejections.
#[derive(Debug, Serialize)]
pub struct BoundaryError {
    pub error: String,
    pub is_trading_day: bool,
    pub reason: String,
    pub date: NaiveDate,
}

fn boundary_error(msg: &str, date: NaiveDate, lookup: &CalendarLookup) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(BoundaryError {
            error: msg.to_string(),
            is_trading_day: lookup.is_trading_day,
            reason: lookup.reason.to_string(),
            date,
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: e.to_string() })).into_response()
}

fn not_found(msg: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: msg.into() })).into_response()
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg.into() })).into_response()
}

fn service_unavailable(msg: impl Into<String>) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody { error: msg.into() })).into_response()
}

// ---- snapshots -------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateSnapshotsQuery {
    pub target_date: NaiveDate,
    pub force: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct GenerateSnapshotsResponse {
    pub created: usize,
    pub updated: usize,
    pub message: String,
}

pub async fn generate_snapshots(
    State(state): State<AppState>,
    Query(q): Query<GenerateSnapshotsQuery>,
) -> Response {
    let now = Utc::now();
    let lookup = match state.calendar.is_trading_day(q.target_date).await {
        Ok(l) => l,
        Err(e) => return internal_error(e),
    };
    if !lookup.is_trading_day {
        return boundary_error("target_date is not a trading day", q.target_date, &lookup);
    }

    let beijing_now = now.with_timezone(&Shanghai);
    let today = beijing_now.date_naive();
    if q.target_date == today {
        let close = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        if beijing_now.time() <= close {
            return boundary_error("today's snapshot cannot be generated before market close", q.target_date, &lookup);
        }
    }

    let instruments = match load_instruments(&state) {
        Ok(v) => v,
        Err(e) => return internal_error(e),
    };
    let rules = match state.db.list_rules() {
        Ok(v) => v,
        Err(e) => return internal_error(e),
    };

    match snapshot::generate_daily_snapshots(
        &state.db,
        &instruments,
        &state.coordinator,
        &state.calendar,
        &state.caches,
        &rules,
        q.target_date,
        q.force.unwrap_or(false),
        state.batch_pool_size,
        now,
    )
    .await
    {
        Ok(outcome) => Json(GenerateSnapshotsResponse {
            created: outcome.created,
            updated: outcome.updated,
            message: outcome.message,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

// ---- reports -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DailyReportQuery {
    pub target_date: NaiveDate,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn daily_report(State(state): State<AppState>, Query(q): Query<DailyReportQuery>) -> Response {
    let lookup = match state.calendar.is_trading_day(q.target_date).await {
        Ok(l) => l,
        Err(e) => return internal_error(e),
    };
    if !lookup.is_trading_day {
        return boundary_error("target_date is not a trading day", q.target_date, &lookup);
    }

    match report::daily_report(&state.db, q.target_date, q.page.unwrap_or(1), q.page_size.unwrap_or(20)) {
        Ok(r) => Json(r).into_response(),
        Err(e) => internal_error(e),
    }
}

// ---- trading calendar ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CalendarCheckQuery {
    pub target_date: NaiveDate,
}

pub async fn calendar_check(State(state): State<AppState>, Query(q): Query<CalendarCheckQuery>) -> Response {
    match state.calendar.is_trading_day(q.target_date).await {
        Ok(lookup) => Json(serde_json::json!({
            "date": q.target_date,
            "is_trading_day": lookup.is_trading_day,
            "reason": lookup.reason,
        }))
        .into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CalendarRefreshQuery {
    pub year: i32,
}

pub async fn calendar_refresh(State(state): State<AppState>, Query(q): Query<CalendarRefreshQuery>) -> Response {
    match state.coordinator.get_trading_dates(q.year).await {
        Ok(fetch) => match state.db.hydrate_year(q.year, &fetch.data) {
            Ok(()) => Json(serde_json::json!({
                "year": q.year,
                "trading_days": fetch.data.len(),
                "source": fetch.provider_name,
            }))
            .into_response(),
            Err(e) => internal_error(e),
        },
        Err(e) => service_unavailable(e.to_string()),
    }
}

// ---- providers -----------------------------------------------------------

pub async fn providers_health(State(state): State<AppState>) -> Response {
    let status: Vec<_> = state
        .coordinator
        .get_health_status()
        .into_iter()
        .map(|(name, snap)| serde_json::json!({ "provider": name, "health": snap }))
        .collect();
    Json(status).into_response()
}

pub async fn providers_capabilities(State(state): State<AppState>) -> Response {
    let caps: Vec<_> = state
        .coordinator
        .get_capabilities()
        .into_iter()
        .map(|(name, caps)| serde_json::json!({ "provider": name, "capabilities": caps }))
        .collect();
    Json(caps).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ProviderNameQuery {
    pub provider_name: String,
}

pub async fn providers_reset(State(state): State<AppState>, Query(q): Query<ProviderNameQuery>) -> Response {
    if state.coordinator.reset_provider(&q.provider_name) {
        Json(serde_json::json!({ "reset": q.provider_name })).into_response()
    } else {
        not_found(format!("unknown provider: {}", q.provider_name))
    }
}

pub async fn providers_reset_all(State(state): State<AppState>) -> Response {
    state.coordinator.reset_all();
    Json(serde_json::json!({ "reset": "all" })).into_response()
}

// ---- stocks: price refresh / cache ---------------------------------------

pub async fn update_price(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let instrument = match state.db.find_by_symbol(&symbol) {
        Ok(Some(i)) => i,
        Ok(None) => return not_found(format!("unknown symbol: {symbol}")),
        Err(e) => return internal_error(e),
    };

    let rules = match state.db.list_rules() {
        Ok(v) => v,
        Err(e) => return internal_error(e),
    };

    let enriched = enrichment::enrich(
        &instrument,
        &state.coordinator,
        &state.calendar,
        &state.caches,
        &rules,
        true,
        false,
        Utc::now(),
    )
    .await;

    let Some(price) = enriched.current_price else {
        return service_unavailable("no provider could supply a current price");
    };

    if let Err(e) = state.db.update_price(instrument.id, price) {
        return internal_error(e);
    }

    Json(serde_json::json!({
        "symbol": instrument.symbol,
        "current_price": price,
        "is_realtime": enriched.is_realtime,
        "ma_results": enriched.ma_results,
        "signal": enriched.signal,
    }))
    .into_response()
}

pub async fn clear_cache_and_refresh(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let normalized = symbol::normalize(&symbol);
    state.caches.evict_symbol(&normalized.code);
    update_price(State(state), Path(symbol)).await
}

// ---- stocks CRUD -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    pub symbol: String,
    pub display_name: String,
    pub ma_spec: Vec<u32>,
}

pub async fn create_stock(State(state): State<AppState>, Json(req): Json<CreateStockRequest>) -> Response {
    if req.ma_spec.is_empty() {
        return bad_request("ma_spec must have at least one period");
    }
    match state.db.find_by_symbol(&req.symbol) {
        Ok(Some(_)) => return bad_request(format!("duplicate instrument: {}", req.symbol)),
        Ok(None) => {}
        Err(e) => return internal_error(e),
    }
    match state.db.create_stock(&req.symbol, &req.display_name, &req.ma_spec) {
        Ok(instrument) => (StatusCode::CREATED, Json(instrument)).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListStocksQuery {
    pub q: Option<String>,
    pub group_id: Option<i64>,
}

pub async fn list_stocks(State(state): State<AppState>, Query(q): Query<ListStocksQuery>) -> Response {
    let filter = StockFilter { q: q.q, group_id: q.group_id };
    match with_groups(&state, &filter) {
        Ok(instruments) => Json(instruments).into_response(),
        Err(e) => internal_error(e),
    }
}

fn load_instruments(state: &AppState) -> rusqlite::Result<Vec<Instrument>> {
    with_groups(state, &StockFilter::default())
}

fn with_groups(state: &AppState, filter: &StockFilter) -> rusqlite::Result<Vec<Instrument>> {
    let mut instruments = state.db.list(filter)?;
    for instrument in &mut instruments {
        instrument.groups = state.db.groups_for_stock(instrument.id)?;
    }
    Ok(instruments)
}

pub async fn get_stock(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.get(id) {
        Ok(Some(mut instrument)) => {
            instrument.groups = state.db.groups_for_stock(id).unwrap_or_default();
            Json(instrument).into_response()
        }
        Ok(None) => not_found(format!("unknown instrument id: {id}")),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_stock(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.delete(id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(format!("unknown instrument id: {id}")),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

pub async fn batch_delete_stocks(State(state): State<AppState>, Json(req): Json<IdsRequest>) -> Response {
    match state.db.batch_delete(&req.ids) {
        Ok(n) => Json(serde_json::json!({ "deleted": n })).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn stock_charts(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.get(id) {
        Ok(Some(instrument)) => {
            let normalized = symbol::normalize(&instrument.symbol);
            Json(symbol::chart_urls(&normalized.code, normalized.market)).into_response()
        }
        Ok(None) => not_found(format!("unknown instrument id: {id}")),
        Err(e) => internal_error(e),
    }
}

// ---- groups ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

pub async fn create_group(State(state): State<AppState>, Json(req): Json<CreateGroupRequest>) -> Response {
    match state.db.create_group(&req.name) {
        Ok(g) => (StatusCode::CREATED, Json(g)).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn list_groups(State(state): State<AppState>) -> Response {
    match state.db.list_groups() {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_group(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.delete_group(id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(format!("unknown group id: {id}")),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignGroupsRequest {
    pub stock_ids: Vec<i64>,
    pub group_names: Vec<String>,
}

pub async fn batch_assign_groups(State(state): State<AppState>, Json(req): Json<AssignGroupsRequest>) -> Response {
    let mut group_ids = Vec::with_capacity(req.group_names.len());
    for name in &req.group_names {
        match state.db.get_or_create_group(name) {
            Ok(g) => group_ids.push(g.id),
            Err(e) => return internal_error(e),
        }
    }
    match state.db.assign_groups(&req.stock_ids, &group_ids) {
        Ok(()) => Json(serde_json::json!({ "assigned": req.stock_ids.len() })).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromGroupRequest {
    pub stock_ids: Vec<i64>,
    pub group_id: i64,
}

pub async fn batch_remove_from_group(State(state): State<AppState>, Json(req): Json<RemoveFromGroupRequest>) -> Response {
    match state.db.remove_from_group(&req.stock_ids, req.group_id) {
        Ok(()) => Json(serde_json::json!({ "removed": req.stock_ids.len() })).into_response(),
        Err(e) => internal_error(e),
    }
}

// ---- fundamentals (financial report / valuation / macro) -----------------

pub async fn financial_report(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let normalized = symbol::normalize(&symbol);
    if let Some(cached) = state.caches.get_financial_report(&normalized.code) {
        return Json(cached).into_response();
    }
    match state.coordinator.get_financial_report(&normalized.code).await {
        Ok(fetch) => {
            state.caches.set_financial_report(&normalized.code, fetch.data.clone());
            Json(fetch.data).into_response()
        }
        Err(e) => service_unavailable(e.to_string()),
    }
}

pub async fn valuation_metrics(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let normalized = symbol::normalize(&symbol);
    if let Some(cached) = state.caches.get_valuation_metrics(&normalized.code) {
        return Json(cached).into_response();
    }
    match state.coordinator.get_valuation_metrics(&normalized.code).await {
        Ok(fetch) => {
            state.caches.set_valuation_metrics(&normalized.code, fetch.data.clone());
            Json(fetch.data).into_response()
        }
        Err(e) => service_unavailable(e.to_string()),
    }
}

pub async fn macro_indicators(State(state): State<AppState>) -> Response {
    if let Some(cached) = state.caches.get_macro_indicators() {
        return Json(cached).into_response();
    }
    match state.coordinator.get_macro_indicators().await {
        Ok(fetch) => {
            state.caches.set_macro_indicators(fetch.data.clone());
            Json(fetch.data).into_response()
        }
        Err(e) => service_unavailable(e.to_string()),
    }
}

pub async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
