//! Demand notes: the case records jobs and demand files hang off.

use rusqlite::params;

use super::{timestamp_now, Database, DatabaseError};

/// Inserts a demand note.
pub fn insert(db: &Database, id: &str, title: Option<&str>) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO \"DemandNote\" (\"id\", \"title\", \"createdAt\") VALUES (?1, ?2, ?3)",
            params![id, title, timestamp_now()],
        )?;
        Ok(())
    })
}

pub fn exists(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM \"DemandNote\" WHERE \"id\" = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}
