use super::Db;
use crate::models::CalendarEntry;
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, OptionalExtension};

impl Db {
    pub fn calendar_entry(&self, date: NaiveDate) -> rusqlite::Result<Option<CalendarEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT trade_date, is_trading_day, year FROM trading_calendar WHERE trade_date = ?1",
                params![date.to_string()],
                row_to_entry,
            )
            .optional()
        })
    }

    pub fn year_hydrated(&self, year: i32) -> rusqlite::Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM trading_calendar WHERE year = ?1",
                params![year],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Replace every row for `year` with the supplied set of trading dates.
    /// Called under C7's per-process hydration lock, so this never races
    /// with another hydration of the same year.
    pub fn hydrate_year(&self, year: i32, trading_dates: &[NaiveDate]) -> rusqlite::Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM trading_calendar WHERE year = ?1", params![year])?;

            let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
            let days_in_year = if chrono::NaiveDate::from_ymd_opt(year + 1, 1, 1).is_some() {
                (NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap() - jan1).num_days()
            } else {
                365
            };

            let trading_set: std::collections::HashSet<NaiveDate> = trading_dates.iter().copied().collect();

            for offset in 0..days_in_year {
                let date = jan1 + chrono::Duration::days(offset);
                if date.year() != year {
                    break;
                }
                let is_trading = trading_set.contains(&date) as i64;
                conn.execute(
                    "INSERT INTO trading_calendar (trade_date, is_trading_day, year) VALUES (?1, ?2, ?3)",
                    params![date.to_string(), is_trading, year],
                )?;
            }
            Ok(())
        })
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CalendarEntry> {
    let date_str: String = row.get(0)?;
    let is_trading: i64 = row.get(1)?;
    Ok(CalendarEntry {
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        is_trading_day: is_trading != 0,
        year: row.get(2)?,
    })
}
