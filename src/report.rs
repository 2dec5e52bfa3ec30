//! Differential daily report: classifies each instrument/MA pair against
//! the most recent prior snapshot, sorts and pages the two resulting
//! lists, and rolls up summary statistics (P8/P9).

use crate::models::Snapshot;
use crate::storage::Db;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachType {
    NewReach,
    ContinuousReach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallType {
    NewFall,
    ContinuousBelow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReachedIndicator {
    pub instrument_id: i64,
    pub symbol: String,
    pub display_name: String,
    pub ma_period: u32,
    pub ma_price: f64,
    pub current_price: f64,
    pub diff: f64,
    pub diff_pct: f64,
    pub reach_type: ReachType,
}

#[derive(Debug, Clone, Serialize)]
pub struct BelowStockItem {
    pub instrument_id: i64,
    pub symbol: String,
    pub display_name: String,
    pub ma_period: u32,
    pub ma_price: f64,
    pub current_price: f64,
    pub diff: f64,
    pub diff_pct: f64,
    pub fall_type: FallType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub reached_count: usize,
    pub newly_reached_count: usize,
    pub newly_below_count: usize,
    pub continuous_below_count: usize,
    pub reached_rate: f64,
    pub reached_rate_change: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub target_date: NaiveDate,
    pub page: u32,
    pub page_size: u32,
    pub reached_stocks: Vec<ReachedIndicator>,
    pub below_stocks: Vec<BelowStockItem>,
    pub summary: ReportSummary,
}

pub fn daily_report(db: &Db, target_date: NaiveDate, page: u32, page_size: u32) -> anyhow::Result<DailyReport> {
    let today_snapshots = db.snapshots_for_date(target_date)?;
    if today_snapshots.is_empty() {
        return Ok(empty_report(target_date, page, page_size));
    }

    let mut reached_all: Vec<ReachedIndicator> = Vec::new();
    let mut below_all: Vec<BelowStockItem> = Vec::new();
    let mut reached_count = 0usize;
    let mut continuous_below_count = 0usize;

    for snap in &today_snapshots {
        let stock = db.get(snap.instrument_id)?;
        let (symbol, display_name) = match &stock {
            Some(s) => (s.symbol.clone(), s.display_name.clone()),
            None => (String::new(), String::new()),
        };

        let prior = db.latest_snapshot_before(snap.instrument_id, target_date)?;
        let mut any_reached_today = false;

        for (ma_key, result) in &snap.ma_results {
            let ma_period: u32 = ma_key.trim_start_matches("MA").parse().unwrap_or(0);
            let prior_reached = prior_reached_for(&prior, ma_key);

            if result.reached {
                any_reached_today = true;
                let reach_type = if prior_reached { ReachType::ContinuousReach } else { ReachType::NewReach };
                reached_all.push(ReachedIndicator {
                    instrument_id: snap.instrument_id,
                    symbol: symbol.clone(),
                    display_name: display_name.clone(),
                    ma_period,
                    ma_price: result.ma_price,
                    current_price: snap.price,
                    diff: result.diff,
                    diff_pct: result.diff_pct,
                    reach_type,
                });
            } else {
                let fall_type = if prior_reached { FallType::NewFall } else { FallType::ContinuousBelow };
                if fall_type == FallType::ContinuousBelow {
                    continuous_below_count += 1;
                }
                below_all.push(BelowStockItem {
                    instrument_id: snap.instrument_id,
                    symbol: symbol.clone(),
                    display_name: display_name.clone(),
                    ma_period,
                    ma_price: result.ma_price,
                    current_price: snap.price,
                    diff: result.diff,
                    diff_pct: result.diff_pct,
                    fall_type,
                });
            }
        }

        if any_reached_today {
            reached_count += 1;
        }
    }

    let newly_reached_count = reached_all.iter().filter(|r| r.reach_type == ReachType::NewReach).count();
    let newly_below_count = below_all.iter().filter(|b| b.fall_type == FallType::NewFall).count();

    reached_all.sort_by(|a, b| b.diff_pct.abs().partial_cmp(&a.diff_pct.abs()).unwrap_or(std::cmp::Ordering::Equal));
    below_all.sort_by(|a, b| {
        a.ma_period
            .cmp(&b.ma_period)
            .then_with(|| match (a.fall_type, b.fall_type) {
                (FallType::NewFall, FallType::ContinuousBelow) => std::cmp::Ordering::Less,
                (FallType::ContinuousBelow, FallType::NewFall) => std::cmp::Ordering::Greater,
                _ => std::cmp::Ordering::Equal,
            })
            .then(a.diff_pct.partial_cmp(&b.diff_pct).unwrap_or(std::cmp::Ordering::Equal))
    });

    let total = today_snapshots.len();
    let reached_rate = if total > 0 { reached_count as f64 / total as f64 * 100.0 } else { 0.0 };

    let prior_date = db.latest_snapshot_before(today_snapshots[0].instrument_id, target_date)?.map(|s| s.date);
    let reached_rate_change = match prior_date {
        Some(pd) => {
            let prior_snapshots = db.snapshots_for_date(pd)?;
            let prior_total = prior_snapshots.len();
            let prior_reached = prior_snapshots.iter().filter(|s| s.ma_results.values().any(|r| r.reached)).count();
            let prior_rate = if prior_total > 0 { prior_reached as f64 / prior_total as f64 * 100.0 } else { 0.0 };
            round2(reached_rate - prior_rate)
        }
        None => 0.0,
    };

    let page = page.max(1);
    let start = ((page - 1) * page_size) as usize;
    let reached_page = reached_all.into_iter().skip(start).take(page_size as usize).collect();

    Ok(DailyReport {
        target_date,
        page,
        page_size,
        reached_stocks: reached_page,
        below_stocks: below_all,
        summary: ReportSummary {
            total,
            reached_count,
            newly_reached_count,
            newly_below_count,
            continuous_below_count,
            reached_rate: round2(reached_rate),
            reached_rate_change,
        },
    })
}

fn prior_reached_for(prior: &Option<Snapshot>, ma_key: &str) -> bool {
    prior.as_ref().and_then(|s| s.ma_results.get(ma_key)).map(|r| r.reached).unwrap_or(false)
}

fn empty_report(target_date: NaiveDate, page: u32, page_size: u32) -> DailyReport {
    DailyReport {
        target_date,
        page,
        page_size,
        reached_stocks: Vec::new(),
        below_stocks: Vec::new(),
        summary: ReportSummary {
            total: 0,
            reached_count: 0,
            newly_reached_count: 0,
            newly_below_count: 0,
            continuous_below_count: 0,
            reached_rate: 0.0,
            reached_rate_change: 0.0,
        },
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, MaResult};
    use std::collections::BTreeMap;

    fn ma_result(ma_price: f64, price: f64) -> MaResult {
        MaResult {
            ma_price,
            reached: price >= ma_price,
            diff: price - ma_price,
            diff_pct: (price - ma_price) / ma_price * 100.0,
            data_source: DataSource::Realtime,
        }
    }

    #[test]
    fn reached_count_matches_any_ma_reached() {
        let db = Db::open_in_memory().unwrap();
        let stock = db.create_stock("600519", "贵州茅台", &[5]).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let mut yesterday_ma = BTreeMap::new();
        yesterday_ma.insert("MA5".to_string(), ma_result(100.0, 90.0));
        db.upsert_snapshot(&Snapshot { instrument_id: stock.id, date: yesterday, price: 90.0, ma_results: yesterday_ma }, false).unwrap();

        let mut today_ma = BTreeMap::new();
        today_ma.insert("MA5".to_string(), ma_result(100.0, 105.0));
        db.upsert_snapshot(&Snapshot { instrument_id: stock.id, date: today, price: 105.0, ma_results: today_ma }, false).unwrap();

        let report = daily_report(&db, today, 1, 20).unwrap();
        assert_eq!(report.summary.reached_count, 1);
        assert_eq!(report.summary.newly_reached_count, 1);
        assert_eq!(report.reached_stocks[0].reach_type, ReachType::NewReach);
    }

    #[test]
    fn empty_snapshots_yield_empty_report() {
        let db = Db::open_in_memory().unwrap();
        let report = daily_report(&db, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(), 1, 20).unwrap();
        assert_eq!(report.summary.total, 0);
        assert!(report.reached_stocks.is_empty());
    }
}
