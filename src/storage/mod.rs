//! SQLite-backed persistence. Connections are thread-confined behind a
//! single mutex per `Db` handle — batch enrichment workers never touch the
//! database directly (§5); only the submitting thread and the API handlers
//! do.

pub mod calendar;
pub mod groups;
pub mod rules;
pub mod schema;
pub mod signals;
pub mod snapshots;
pub mod stocks;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        schema::bootstrap(&conn)?;
        Ok(Db {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::bootstrap(&conn)?;
        Ok(Db {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let guard = self.conn.lock();
        f(&guard)
    }
}
