//! Process-wide single-entry cache for the full A-share market snapshot,
//! shared by the bulk (L2) and A-share fundamentals (L5) providers.
//!
//! Validity: 5 minutes during a trading session, otherwise valid until the
//! next session open. Access is single-flight — a reader that finds the
//! cache stale holds the lock across the refetch.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Asia::Shanghai;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CACHE_TTL_TRADING_SECS: i64 = 300;

/// Whether `now` (any timezone) falls inside an A-share trading session,
/// evaluated in Beijing local time: `[09:30,11:30] ∪ [13:00,15:00]`, Mon–Fri.
pub fn is_trading_time(now: DateTime<Utc>) -> bool {
    let beijing = now.with_timezone(&Shanghai);
    if beijing.weekday().num_days_from_monday() >= 5 {
        return false;
    }
    let t = beijing.time();
    let morning_start = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    let morning_end = NaiveTime::from_hms_opt(11, 30, 0).unwrap();
    let afternoon_start = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
    let afternoon_end = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

    (t >= morning_start && t <= morning_end) || (t >= afternoon_start && t <= afternoon_end)
}

/// Next 09:30 Beijing session open at or after `now`.
pub fn next_trading_open(now: DateTime<Utc>) -> DateTime<Utc> {
    let beijing = now.with_timezone(&Shanghai);
    let afternoon_end = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

    if beijing.time() < afternoon_end && beijing.weekday().num_days_from_monday() < 5 {
        return beijing
            .with_hour(9)
            .unwrap()
            .with_minute(30)
            .unwrap()
            .with_second(0)
            .unwrap()
            .with_nanosecond(0)
            .unwrap()
            .with_timezone(&Utc);
    }

    let mut day = beijing.date_naive().succ_opt().unwrap();
    for _ in 0..7 {
        if day.weekday().num_days_from_monday() < 5 {
            let naive = day.and_hms_opt(9, 30, 0).unwrap();
            return Shanghai
                .from_local_datetime(&naive)
                .single()
                .unwrap()
                .with_timezone(&Utc);
        }
        day = day.succ_opt().unwrap();
    }
    now + chrono::Duration::days(1)
}

fn is_cache_valid(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if is_trading_time(now) {
        return (now - fetched_at).num_seconds() < CACHE_TTL_TRADING_SECS;
    }
    let next_open = next_trading_open(now);
    if fetched_at.with_timezone(&Shanghai).date_naive() == now.with_timezone(&Shanghai).date_naive()
        || fetched_at < next_open
    {
        return now < next_open;
    }
    false
}

#[derive(Clone)]
struct Entry {
    data: Arc<Vec<crate::providers::StockData>>,
    fetched_at: DateTime<Utc>,
    source: String,
}

#[derive(Default)]
pub struct SpotCache {
    entry: Mutex<Option<Entry>>,
}

impl SpotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, now: DateTime<Utc>) -> Option<Arc<Vec<crate::providers::StockData>>> {
        let guard = self.entry.lock().await;
        match guard.as_ref() {
            Some(e) if is_cache_valid(e.fetched_at, now) => Some(e.data.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, data: Vec<crate::providers::StockData>, source: &str, now: DateTime<Utc>) {
        *self.entry.lock().await = Some(Entry {
            data: Arc::new(data),
            fetched_at: now,
            source: source.to_string(),
        });
    }

    pub async fn clear(&self) {
        *self.entry.lock().await = None;
    }

    /// Cache-or-fetch: holds the `tokio::sync::Mutex` guard across `fetch`
    /// itself, not just the check, so a second caller arriving on a cold or
    /// stale cache blocks on the lock instead of firing its own outbound
    /// call — true single-flight rather than check-then-fetch-unlocked.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        source: &str,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Option<Arc<Vec<crate::providers::StockData>>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Vec<crate::providers::StockData>>>,
    {
        let mut guard = self.entry.lock().await;
        if let Some(e) = guard.as_ref() {
            if is_cache_valid(e.fetched_at, now) {
                return Some(e.data.clone());
            }
        }

        match fetch().await {
            Ok(data) if !data.is_empty() => {
                let data = Arc::new(data);
                *guard = Some(Entry { data: data.clone(), fetched_at: now, source: source.to_string() });
                Some(data)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn beijing_utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Shanghai
            .with_ymd_and_hms(y, m, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn weekday_morning_session() {
        // 2024-01-08 is a Monday
        assert!(is_trading_time(beijing_utc(2024, 1, 8, 10, 0)));
        assert!(!is_trading_time(beijing_utc(2024, 1, 8, 12, 0)));
        assert!(is_trading_time(beijing_utc(2024, 1, 8, 14, 0)));
    }

    #[test]
    fn weekend_never_trading() {
        // 2024-01-06 is a Saturday
        assert!(!is_trading_time(beijing_utc(2024, 1, 6, 10, 0)));
    }

    #[test]
    fn cache_expires_after_five_minutes_in_session() {
        let fetched = beijing_utc(2024, 1, 8, 10, 0);
        assert!(is_cache_valid(fetched, fetched + chrono::Duration::seconds(299)));
        assert!(!is_cache_valid(fetched, fetched + chrono::Duration::seconds(301)));
    }

    #[test]
    fn cache_persists_until_next_open_after_hours() {
        let fetched = beijing_utc(2024, 1, 8, 15, 30);
        let next_open = next_trading_open(fetched);
        assert!(is_cache_valid(fetched, next_open - chrono::Duration::minutes(1)));
        assert!(!is_cache_valid(fetched, next_open + chrono::Duration::minutes(1)));
    }
}
