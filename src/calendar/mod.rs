//! Trading calendar lookups with DB-first, provider-fallback hydration.
//!
//! `is_trading_day` always answers from the database; the database is kept
//! current by `ensure_hydrated`, which holds a per-process lock so two
//! concurrent callers never hydrate the same year twice.

use crate::providers::coordinator::Coordinator;
use crate::storage::Db;
use chrono::{Datelike, NaiveDate, Weekday};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarLookup {
    pub is_trading_day: bool,
    pub reason: &'static str,
}

/// Tracks which years are currently mid-hydration so a second caller waits
/// on the lock rather than re-fetching in parallel.
pub struct TradingCalendar {
    db: Db,
    coordinator: Arc<Coordinator>,
    hydrating: Mutex<HashSet<i32>>,
}

impl TradingCalendar {
    pub fn new(db: Db, coordinator: Arc<Coordinator>) -> Self {
        TradingCalendar {
            db,
            coordinator,
            hydrating: Mutex::new(HashSet::new()),
        }
    }

    pub async fn is_trading_day(&self, date: NaiveDate) -> anyhow::Result<CalendarLookup> {
        self.ensure_hydrated(date.year()).await;

        if let Some(entry) = self.db.calendar_entry(date)? {
            let reason = if entry.is_trading_day {
                "交易日"
            } else if is_weekend(date) {
                "周末"
            } else {
                "节假日"
            };
            return Ok(CalendarLookup { is_trading_day: entry.is_trading_day, reason });
        }

        if let Ok(fetch) = self.coordinator.get_trading_dates(date.year()).await {
            let is_trading = fetch.data.contains(&date);
            return Ok(CalendarLookup {
                is_trading_day: is_trading,
                reason: if is_trading { "交易日" } else { "节假日" },
            });
        }

        Ok(basic_fallback(date))
    }

    /// Double-checked hydration: re-check after acquiring the lock in case
    /// another caller finished hydrating this year while we were waiting.
    async fn ensure_hydrated(&self, year: i32) {
        if self.db.year_hydrated(year).unwrap_or(false) {
            return;
        }

        {
            let mut guard = self.hydrating.lock();
            if guard.contains(&year) {
                return;
            }
            guard.insert(year);
        }

        if self.db.year_hydrated(year).unwrap_or(false) {
            self.hydrating.lock().remove(&year);
            return;
        }

        match self.coordinator.get_trading_dates(year).await {
            Ok(fetch) => {
                if let Err(e) = self.db.hydrate_year(year, &fetch.data) {
                    warn!(year, error = %e, "failed to persist hydrated calendar year");
                } else {
                    info!(year, count = fetch.data.len(), source = %fetch.provider_name, "hydrated trading calendar");
                }
            }
            Err(e) => {
                warn!(year, error = %e, "no provider could supply trading dates, leaving year unhydrated");
            }
        }

        self.hydrating.lock().remove(&year);
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn basic_fallback(date: NaiveDate) -> CalendarLookup {
    if is_weekend(date) {
        CalendarLookup { is_trading_day: false, reason: "基础判断" }
    } else {
        CalendarLookup { is_trading_day: true, reason: "基础判断" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekend_fallback_is_non_trading() {
        let sat = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let looked = basic_fallback(sat);
        assert!(!looked.is_trading_day);
        assert_eq!(looked.reason, "基础判断");
    }

    #[test]
    fn weekday_fallback_is_trading() {
        let mon = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let looked = basic_fallback(mon);
        assert!(looked.is_trading_day);
    }

    #[tokio::test]
    async fn db_row_wins_over_fallback_even_when_it_disagrees() {
        let db = Db::open_in_memory().unwrap();
        let holiday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(); // a Monday, but pretend holiday
        db.hydrate_year(2024, &[]).unwrap();
        let coordinator = Arc::new(Coordinator::new(Vec::new(), 0, 5));
        let cal = TradingCalendar::new(db, coordinator);
        let looked = cal.is_trading_day(holiday).await.unwrap();
        assert!(!looked.is_trading_day);
        assert_eq!(looked.reason, "节假日");
    }
}
