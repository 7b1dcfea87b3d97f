use crate::Database;
use crate::models::AdvisoryRow;
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Advisories --

    /// Insert an advisory and return the stored row, including the
    /// `created_at` stamped by SQLite.
    pub fn insert_advisory(&self, id: &str, message: &str) -> Result<AdvisoryRow> {
        self.with_conn_mut(|conn| {
            let row = conn.query_row(
                "INSERT INTO advisories (id, message) VALUES (?1, ?2)
                 RETURNING id, message, created_at",
                rusqlite::params![id, message],
                map_advisory,
            )?;
            Ok(row)
        })
    }

    pub fn get_advisory(&self, id: &str) -> Result<Option<AdvisoryRow>> {
        self.with_conn(|conn| query_advisory(conn, id))
    }

    pub fn count_advisories(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM advisories", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn map_advisory(row: &Row<'_>) -> rusqlite::Result<AdvisoryRow> {
    Ok(AdvisoryRow {
        id: row.get(0)?,
        message: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn query_advisory(conn: &Connection, id: &str) -> Result<Option<AdvisoryRow>> {
    let mut stmt =
        conn.prepare("SELECT id, message, created_at FROM advisories WHERE id = ?1")?;

    let row = stmt.query_row([id], map_advisory).optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
