use super::Db;
use crate::models::{Signal, SignalKind};
use rusqlite::params;

impl Db {
    /// Append-only: one row per (instrument, day) the rule engine fires on.
    pub fn insert_signal(&self, signal: &Signal) -> rusqlite::Result<i64> {
        self.with_conn(|conn| {
            let kind = match signal.kind {
                SignalKind::Buy => "buy",
                SignalKind::Sell => "sell",
                SignalKind::Hold => "hold",
            };
            conn.execute(
                "INSERT INTO signals (stock_id, signal_date, signal_type, current_price, entry_price, \
                 stop_loss, take_profit, strength, triggers, indicators) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    signal.instrument_id,
                    signal.signal_date.to_string(),
                    kind,
                    signal.entry_price,
                    signal.entry_price,
                    signal.stop_loss,
                    signal.take_profit,
                    signal.strength,
                    serde_json::to_string(&signal.triggers).unwrap_or_default(),
                    signal.indicators.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}
