//! Instrument CRUD. Out-of-scope for the core's pipeline budget (§1), kept
//! minimal so C12/C13 have something real to enrich and snapshot.

use super::Db;
use crate::models::{Group, Instrument};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

#[derive(Default)]
pub struct StockFilter {
    pub q: Option<String>,
    pub group_id: Option<i64>,
}

impl Db {
    pub fn create_stock(
        &self,
        symbol: &str,
        display_name: &str,
        ma_spec: &[u32],
    ) -> rusqlite::Result<Instrument> {
        let ma_types = ma_spec.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(",");
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stocks (symbol, name, ma_types) VALUES (?1, ?2, ?3)",
                params![symbol, display_name, ma_types],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Instrument {
                id,
                symbol: symbol.to_string(),
                display_name: display_name.to_string(),
                ma_spec: ma_spec.to_vec(),
                last_price: None,
                last_updated_at: None,
                groups: Vec::new(),
            })
        })
    }

    pub fn find_by_symbol(&self, symbol: &str) -> rusqlite::Result<Option<Instrument>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, symbol, name, ma_types, current_price, updated_at FROM stocks WHERE symbol = ?1",
                params![symbol],
                row_to_instrument,
            )
            .optional()
        })
    }

    pub fn get(&self, id: i64) -> rusqlite::Result<Option<Instrument>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, symbol, name, ma_types, current_price, updated_at FROM stocks WHERE id = ?1",
                params![id],
                row_to_instrument,
            )
            .optional()
        })
    }

    pub fn list(&self, filter: &StockFilter) -> rusqlite::Result<Vec<Instrument>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT DISTINCT s.id, s.symbol, s.name, s.ma_types, s.current_price, s.updated_at FROM stocks s",
            );
            if filter.group_id.is_some() {
                sql.push_str(" JOIN stock_group_association g ON g.stock_id = s.id");
            }
            sql.push_str(" WHERE 1=1");
            if filter.q.is_some() {
                sql.push_str(" AND (s.symbol LIKE ?1 OR s.name LIKE ?1)");
            }
            if filter.group_id.is_some() {
                sql.push_str(" AND g.group_id = ?2");
            }
            sql.push_str(" ORDER BY s.created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let like = filter.q.as_ref().map(|q| format!("%{q}%"));
            let rows = match (&like, filter.group_id) {
                (Some(like), Some(gid)) => {
                    stmt.query_map(params![like, gid], row_to_instrument)?.collect::<Result<Vec<_>, _>>()?
                }
                (Some(like), None) => {
                    stmt.query_map(params![like], row_to_instrument)?.collect::<Result<Vec<_>, _>>()?
                }
                (None, Some(gid)) => {
                    stmt.query_map(params![gid], row_to_instrument)?.collect::<Result<Vec<_>, _>>()?
                }
                (None, None) => stmt.query_map([], row_to_instrument)?.collect::<Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
    }

    pub fn update_price(&self, id: i64, price: f64) -> rusqlite::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE stocks SET current_price = ?1, updated_at = ?2 WHERE id = ?3",
                params![price, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, id: i64) -> rusqlite::Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM stocks WHERE id = ?1", params![id])? > 0))
    }

    pub fn batch_delete(&self, ids: &[i64]) -> rusqlite::Result<usize> {
        self.with_conn(|conn| {
            let mut deleted = 0;
            for id in ids {
                deleted += conn.execute("DELETE FROM stocks WHERE id = ?1", params![id])?;
            }
            Ok(deleted)
        })
    }

    pub fn groups_for_stock(&self, stock_id: i64) -> rusqlite::Result<Vec<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name FROM groups g JOIN stock_group_association a ON a.group_id = g.id WHERE a.stock_id = ?1",
            )?;
            stmt.query_map(params![stock_id], |row| Ok(Group { id: row.get(0)?, name: row.get(1)? }))?
                .collect()
        })
    }

    pub fn assign_groups(&self, stock_ids: &[i64], group_ids: &[i64]) -> rusqlite::Result<()> {
        self.with_conn(|conn| {
            for sid in stock_ids {
                for gid in group_ids {
                    conn.execute(
                        "INSERT OR IGNORE INTO stock_group_association (stock_id, group_id) VALUES (?1, ?2)",
                        params![sid, gid],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub fn remove_from_group(&self, stock_ids: &[i64], group_id: i64) -> rusqlite::Result<()> {
        self.with_conn(|conn| {
            for sid in stock_ids {
                conn.execute(
                    "DELETE FROM stock_group_association WHERE stock_id = ?1 AND group_id = ?2",
                    params![sid, group_id],
                )?;
            }
            Ok(())
        })
    }
}

fn row_to_instrument(row: &rusqlite::Row) -> rusqlite::Result<Instrument> {
    let ma_types: String = row.get(3)?;
    let ma_spec = ma_types
        .split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .collect();
    let updated_at: Option<String> = row.get(5)?;
    Ok(Instrument {
        id: row.get(0)?,
        symbol: row.get(1)?,
        display_name: row.get(2)?,
        ma_spec,
        last_price: row.get(4)?,
        last_updated_at: updated_at.and_then(|s| s.parse().ok()),
        groups: Vec::new(),
    })
}
