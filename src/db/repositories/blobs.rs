use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_epoch_ms, to_epoch_ms, to_u64},
    models::SessionBlob,
};

fn row_to_blob(row: &Row) -> Result<SessionBlob> {
    let start_time: i64 = row.get("start_time")?;
    let end_time: i64 = row.get("end_time")?;
    Ok(SessionBlob {
        blob_id: row.get("blob_id")?,
        start_time: parse_epoch_ms(start_time, "start_time")?,
        end_time: parse_epoch_ms(end_time, "end_time")?,
    })
}

pub struct BlobRepository<'a> {
    conn: &'a Connection,
}

impl<'a> BlobRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, blob: &SessionBlob) -> Result<()> {
        self.conn.execute(
            "INSERT INTO blobs (blob_id, start_time, end_time)
             VALUES (?1, ?2, ?3)",
            params![
                blob.blob_id,
                to_epoch_ms(blob.start_time),
                to_epoch_ms(blob.end_time),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, blob_id: &str) -> Result<Option<SessionBlob>> {
        let mut stmt = self.conn.prepare(
            "SELECT blob_id, start_time, end_time
             FROM blobs WHERE blob_id = ?1",
        )?;

        let mut rows = stmt.query(params![blob_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_blob(row)?)),
            None => Ok(None),
        }
    }

    /// Blobs recent enough for a new read to join: `end_time >= cutoff`.
    pub fn candidates_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionBlob>> {
        let mut stmt = self.conn.prepare(
            "SELECT blob_id, start_time, end_time
             FROM blobs WHERE end_time >= ?1",
        )?;

        let mut rows = stmt.query(params![to_epoch_ms(cutoff)])?;
        let mut blobs = Vec::new();
        while let Some(row) = rows.next()? {
            blobs.push(row_to_blob(row)?);
        }
        Ok(blobs)
    }

    pub fn update_bounds(
        &self,
        blob_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE blobs SET start_time = ?1, end_time = ?2 WHERE blob_id = ?3",
            params![to_epoch_ms(start_time), to_epoch_ms(end_time), blob_id],
        )?;
        Ok(affected > 0)
    }

    pub fn delete(&self, blob_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM blobs WHERE blob_id = ?1", params![blob_id])?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        to_u64(count, "blob count")
    }
}

impl Database {
    pub async fn get_blob(&self, blob_id: &str) -> Result<Option<SessionBlob>> {
        let blob_id = blob_id.to_string();
        self.execute(move |conn| BlobRepository::new(conn).get(&blob_id))
            .await
    }

    /// Reading sessions by recency, for the session list view.
    pub async fn list_recent_blobs(&self, offset: u32, limit: u32) -> Result<Vec<SessionBlob>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT blob_id, start_time, end_time
                 FROM blobs
                 ORDER BY end_time DESC
                 LIMIT ?1 OFFSET ?2",
            )?;

            let mut rows = stmt.query(params![i64::from(limit), i64::from(offset)])?;
            let mut blobs = Vec::new();
            while let Some(row) = rows.next()? {
                blobs.push(row_to_blob(row)?);
            }
            Ok(blobs)
        })
        .await
    }

    pub async fn count_blobs(&self) -> Result<u64> {
        self.execute(|conn| BlobRepository::new(conn).count()).await
    }
}
