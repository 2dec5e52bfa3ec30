//! Decides whether an instrument's price needs a fresh fetch before
//! recomputation, and whether that fetch should be flagged realtime.

use crate::config::Market;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Asia::Shanghai;

/// Whether `now` falls inside `market`'s live-quote session window: CN uses
/// the A-share Beijing session `[09:30,11:30] ∪ [13:00,15:00]`; US uses
/// `[09:30,16:00]` Eastern (spec §6's "US-session checks use
/// `America/New_York`").
pub fn is_trading_time(market: Market, now: DateTime<Utc>) -> bool {
    match market {
        Market::Cn => crate::providers::spot_cache::is_trading_time(now),
        Market::Us => {
            let eastern = now.with_timezone(&New_York);
            if eastern.weekday().num_days_from_monday() >= 5 {
                return false;
            }
            let t = eastern.time();
            let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
            let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
            t >= open && t <= close
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessDecision {
    pub should_fetch: bool,
    pub reason: &'static str,
    pub is_realtime: bool,
}

/// Most recent weekday 15:00 Beijing time at or before `now`, skipping
/// weekends — the reference point for "has this gone stale since the last
/// close".
fn most_recent_close(now: DateTime<Utc>) -> DateTime<Utc> {
    let beijing = now.with_timezone(&Shanghai);
    let close_time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

    let mut day = beijing.date_naive();
    let mut candidate = Shanghai.from_local_datetime(&day.and_time(close_time)).single().unwrap();
    if candidate > beijing || day.weekday() == Weekday::Sat || day.weekday() == Weekday::Sun {
        loop {
            day = day.pred_opt().unwrap();
            candidate = Shanghai.from_local_datetime(&day.and_time(close_time)).single().unwrap();
            if day.weekday() != Weekday::Sat && day.weekday() != Weekday::Sun && candidate <= beijing {
                break;
            }
        }
    }
    candidate.with_timezone(&Utc)
}

pub fn decide(
    market: Market,
    is_trading_day: bool,
    last_price: Option<f64>,
    last_updated_at: Option<DateTime<Utc>>,
    need_calc: bool,
    now: DateTime<Utc>,
) -> FreshnessDecision {
    if need_calc {
        return FreshnessDecision { should_fetch: true, reason: "need_calc", is_realtime: false };
    }

    if market == Market::Cn && !is_trading_day {
        return FreshnessDecision { should_fetch: false, reason: "non_trading_day", is_realtime: false };
    }

    let in_session = is_trading_time(market, now);
    if in_session {
        return FreshnessDecision { should_fetch: true, reason: "in_session", is_realtime: is_trading_day };
    }

    match last_price {
        None => return FreshnessDecision { should_fetch: true, reason: "no_price", is_realtime: false },
        Some(p) if p <= 0.0 => {
            return FreshnessDecision { should_fetch: true, reason: "zero_price", is_realtime: false }
        }
        _ => {}
    }

    match last_updated_at {
        None => FreshnessDecision { should_fetch: true, reason: "never_updated", is_realtime: false },
        Some(updated) if updated < most_recent_close(now) => {
            FreshnessDecision { should_fetch: true, reason: "stale_since_close", is_realtime: false }
        }
        Some(_) => FreshnessDecision { should_fetch: false, reason: "fresh", is_realtime: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn beijing_utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Shanghai.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn need_calc_always_fetches_non_realtime() {
        let now = beijing_utc(2024, 1, 8, 10, 0);
        let d = decide(Market::Cn, true, Some(10.0), Some(now), true, now);
        assert!(d.should_fetch);
        assert!(!d.is_realtime);
        assert_eq!(d.reason, "need_calc");
    }

    #[test]
    fn non_trading_day_skips_fetch() {
        let now = beijing_utc(2024, 1, 6, 10, 0); // Saturday
        let d = decide(Market::Cn, false, Some(10.0), Some(now), false, now);
        assert!(!d.should_fetch);
    }

    #[test]
    fn in_session_fetches_and_flags_realtime() {
        let now = beijing_utc(2024, 1, 8, 10, 0); // Monday morning session
        let d = decide(Market::Cn, true, Some(10.0), Some(now), false, now);
        assert!(d.should_fetch);
        assert!(d.is_realtime);
    }

    #[test]
    fn null_price_forces_fetch() {
        let now = beijing_utc(2024, 1, 8, 20, 0);
        let d = decide(Market::Cn, true, None, None, false, now);
        assert!(d.should_fetch);
        assert_eq!(d.reason, "no_price");
    }

    #[test]
    fn fresh_after_hours_skips_fetch() {
        let close = beijing_utc(2024, 1, 8, 15, 0);
        let now = beijing_utc(2024, 1, 8, 16, 0);
        let d = decide(Market::Cn, true, Some(10.0), Some(close), false, now);
        assert!(!d.should_fetch);
        assert_eq!(d.reason, "fresh");
    }

    #[test]
    fn stale_since_last_close_forces_fetch() {
        let last_friday_afternoon = beijing_utc(2024, 1, 5, 11, 0);
        let monday_evening = beijing_utc(2024, 1, 8, 20, 0);
        let d = decide(Market::Cn, true, Some(10.0), Some(last_friday_afternoon), false, monday_evening);
        assert!(d.should_fetch);
        assert_eq!(d.reason, "stale_since_close");
    }

    fn eastern_utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        New_York.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn us_session_uses_eastern_time_not_beijing() {
        // 2024-01-08 10:00 Eastern is inside the US session but would be
        // well outside the Beijing session window if misapplied.
        assert!(is_trading_time(Market::Us, eastern_utc(2024, 1, 8, 10, 0)));
        assert!(!is_trading_time(Market::Us, eastern_utc(2024, 1, 8, 8, 0)));
        assert!(!is_trading_time(Market::Us, eastern_utc(2024, 1, 8, 16, 1)));
    }

    #[test]
    fn us_weekend_never_trading() {
        assert!(!is_trading_time(Market::Us, eastern_utc(2024, 1, 6, 10, 0))); // Saturday
    }
}
