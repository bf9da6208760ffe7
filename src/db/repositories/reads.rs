use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_epoch_ms, to_epoch_ms, to_u64},
    models::ReadEvent,
};

fn row_to_read(row: &Row) -> Result<ReadEvent> {
    let timestamp: i64 = row.get("timestamp")?;
    Ok(ReadEvent {
        read_id: row.get("read_id")?,
        gallery_id: row.get("gallery_id")?,
        blob_id: row.get("blob_id")?,
        timestamp: parse_epoch_ms(timestamp, "timestamp")?,
    })
}

/// Conn-level access to the read-event ledger. Constructed over a borrowed
/// connection so the engine can compose it inside one transaction.
pub struct ReadRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ReadRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, read: &ReadEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO reads (read_id, gallery_id, blob_id, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                read.read_id,
                read.gallery_id,
                read.blob_id,
                to_epoch_ms(read.timestamp),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, read_id: &str) -> Result<Option<ReadEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT read_id, gallery_id, blob_id, timestamp
             FROM reads WHERE read_id = ?1",
        )?;

        let mut rows = stmt.query(params![read_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_read(row)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, read_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM reads WHERE read_id = ?1",
                params![read_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns whether a row was actually removed.
    pub fn delete(&self, read_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM reads WHERE read_id = ?1", params![read_id])?;
        Ok(affected > 0)
    }

    /// Timestamps of every read still referencing a blob, for bound
    /// recomputation after a delete.
    pub fn timestamps_for_blob(&self, blob_id: &str) -> Result<Vec<DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT timestamp FROM reads WHERE blob_id = ?1")?;

        let mut rows = stmt.query(params![blob_id])?;
        let mut timestamps = Vec::new();
        while let Some(row) = rows.next()? {
            timestamps.push(parse_epoch_ms(row.get::<_, i64>(0)?, "timestamp")?);
        }
        Ok(timestamps)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reads", [], |row| row.get(0))?;
        to_u64(count, "read count")
    }
}

impl Database {
    /// Reads by timestamp descending, for the history view.
    pub async fn list_recent_reads(&self, offset: u32, limit: u32) -> Result<Vec<ReadEvent>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT read_id, gallery_id, blob_id, timestamp
                 FROM reads
                 ORDER BY timestamp DESC
                 LIMIT ?1 OFFSET ?2",
            )?;

            let mut rows = stmt.query(params![i64::from(limit), i64::from(offset)])?;
            let mut reads = Vec::new();
            while let Some(row) = rows.next()? {
                reads.push(row_to_read(row)?);
            }
            Ok(reads)
        })
        .await
    }

    pub async fn latest_read_for_gallery(&self, gallery_id: &str) -> Result<Option<ReadEvent>> {
        let gallery_id = gallery_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT read_id, gallery_id, blob_id, timestamp
                 FROM reads
                 WHERE gallery_id = ?1
                 ORDER BY timestamp DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![gallery_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_read(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn count_reads(&self) -> Result<u64> {
        self.execute(|conn| ReadRepository::new(conn).count()).await
    }
}
