use super::Db;
use crate::models::Group;
use rusqlite::{params, OptionalExtension};

impl Db {
    pub fn create_group(&self, name: &str) -> rusqlite::Result<Group> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO groups (name) VALUES (?1)", params![name])?;
            Ok(Group {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            })
        })
    }

    pub fn find_group_by_name(&self, name: &str) -> rusqlite::Result<Option<Group>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name FROM groups WHERE name = ?1",
                params![name],
                |row| Ok(Group { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()
        })
    }

    pub fn list_groups(&self) -> rusqlite::Result<Vec<Group>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM groups ORDER BY name")?;
            stmt.query_map([], |row| Ok(Group { id: row.get(0)?, name: row.get(1)? }))?
                .collect()
        })
    }

    pub fn delete_group(&self, id: i64) -> rusqlite::Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM groups WHERE id = ?1", params![id])? > 0))
    }

    /// Find-or-create by name, used by batch group assignment when a named
    /// group doesn't exist yet.
    pub fn get_or_create_group(&self, name: &str) -> rusqlite::Result<Group> {
        if let Some(g) = self.find_group_by_name(name)? {
            return Ok(g);
        }
        self.create_group(name)
    }
}
