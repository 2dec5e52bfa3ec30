use super::Db;
use crate::models::{MaResult, Snapshot};
use chrono::NaiveDate;
use rusqlite::params;
use std::collections::BTreeMap;

pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

impl Db {
    /// Upsert by `(stock_id, snapshot_date)`. When `force` is false and a
    /// row already exists, does nothing and reports `Skipped` — this is
    /// what makes `generate_daily_snapshots(force=false)` idempotent (P7).
    pub fn upsert_snapshot(&self, snap: &Snapshot, force: bool) -> rusqlite::Result<UpsertOutcome> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM stock_snapshots WHERE stock_id = ?1 AND snapshot_date = ?2",
                    params![snap.instrument_id, snap.date.to_string()],
                    |row| row.get(0),
                )
                .ok();

            let ma_json = serde_json::to_string(&snap.ma_results).unwrap_or_else(|_| "{}".to_string());

            match existing {
                Some(_) if !force => Ok(UpsertOutcome::Skipped),
                Some(id) => {
                    conn.execute(
                        "UPDATE stock_snapshots SET price = ?1, ma_results = ?2 WHERE id = ?3",
                        params![snap.price, ma_json, id],
                    )?;
                    Ok(UpsertOutcome::Updated)
                }
                None => {
                    conn.execute(
                        "INSERT INTO stock_snapshots (stock_id, snapshot_date, price, ma_results) VALUES (?1, ?2, ?3, ?4)",
                        params![snap.instrument_id, snap.date.to_string(), snap.price, ma_json],
                    )?;
                    Ok(UpsertOutcome::Created)
                }
            }
        })
    }

    pub fn snapshots_for_date(&self, date: NaiveDate) -> rusqlite::Result<Vec<Snapshot>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT stock_id, snapshot_date, price, ma_results FROM stock_snapshots WHERE snapshot_date = ?1",
            )?;
            stmt.query_map(params![date.to_string()], row_to_snapshot)?.collect()
        })
    }

    /// Most recent snapshot strictly before `date`, per instrument — the
    /// "prior" set used by the differential report.
    pub fn latest_snapshot_before(&self, instrument_id: i64, date: NaiveDate) -> rusqlite::Result<Option<Snapshot>> {
        self.with_conn(|conn| {
            use rusqlite::OptionalExtension;
            conn.query_row(
                "SELECT stock_id, snapshot_date, price, ma_results FROM stock_snapshots \
                 WHERE stock_id = ?1 AND snapshot_date < ?2 ORDER BY snapshot_date DESC LIMIT 1",
                params![instrument_id, date.to_string()],
                row_to_snapshot,
            )
            .optional()
        })
    }
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
    let date_str: String = row.get(1)?;
    let ma_json: String = row.get(3)?;
    let ma_results: BTreeMap<String, MaResult> = serde_json::from_str(&ma_json).unwrap_or_default();
    Ok(Snapshot {
        instrument_id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        price: row.get(2)?,
        ma_results,
    })
}
