use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{to_u64, parse_facet_kind},
    models::{FacetCount, FacetKind, FacetLists},
};
use crate::log_warn;

const ENABLE_LOGS: bool = true;

pub struct FacetRepository<'a> {
    conn: &'a Connection,
}

impl<'a> FacetRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Bump a value's counter by one, creating it at one if absent.
    pub fn increment(&self, kind: FacetKind, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO facet_counts (dimension, value, read_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT(dimension, value) DO UPDATE SET
                 read_count = read_count + 1",
            params![kind.as_str(), value],
        )?;
        Ok(())
    }

    /// Drop a value's counter by one, deleting the row when it reaches
    /// zero. A counter that is already gone means the store drifted;
    /// warn and carry on.
    pub fn decrement(&self, kind: FacetKind, value: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE facet_counts SET read_count = read_count - 1
             WHERE dimension = ?1 AND value = ?2",
            params![kind.as_str(), value],
        )?;

        if affected == 0 {
            log_warn!("no {} counter for '{value}' to decrement", kind.as_str());
            return Ok(());
        }

        self.conn.execute(
            "DELETE FROM facet_counts
             WHERE dimension = ?1 AND value = ?2 AND read_count <= 0",
            params![kind.as_str(), value],
        )?;
        Ok(())
    }

    pub fn read_count(&self, kind: FacetKind, value: &str) -> Result<u64> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT read_count FROM facet_counts
                 WHERE dimension = ?1 AND value = ?2",
                params![kind.as_str(), value],
                |row| row.get(0),
            )
            .optional()?;

        match count {
            Some(count) => to_u64(count, "read_count"),
            None => Ok(0),
        }
    }

    /// Rewrite the membership index rows for a gallery to mirror its
    /// current facet lists.
    pub fn replace_membership(&self, gallery_id: &str, facets: &FacetLists) -> Result<()> {
        self.clear_membership(gallery_id)?;

        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO gallery_facets (dimension, value, gallery_id)
             VALUES (?1, ?2, ?3)",
        )?;
        for kind in FacetKind::ALL {
            for value in kind.values(facets) {
                stmt.execute(params![kind.as_str(), value, gallery_id])?;
            }
        }
        Ok(())
    }

    pub fn clear_membership(&self, gallery_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM gallery_facets WHERE gallery_id = ?1",
            params![gallery_id],
        )?;
        Ok(())
    }

    pub fn count_values(&self, kind: FacetKind) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM facet_counts WHERE dimension = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        to_u64(count, "facet value count")
    }
}

impl Database {
    /// Point lookup of a facet counter; zero when the value was never
    /// read or its counter was deleted.
    pub async fn facet_read_count(&self, kind: FacetKind, value: &str) -> Result<u64> {
        let value = value.to_string();
        self.execute(move |conn| FacetRepository::new(conn).read_count(kind, &value))
            .await
    }

    /// Facet values by read count descending, for the stats leaderboard.
    pub async fn top_facets(
        &self,
        kind: FacetKind,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<FacetCount>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT dimension, value, read_count FROM facet_counts
                 WHERE dimension = ?1
                 ORDER BY read_count DESC, value ASC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let mut rows = stmt.query(params![
                kind.as_str(),
                i64::from(limit),
                i64::from(offset)
            ])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                let dimension: String = row.get(0)?;
                let read_count: i64 = row.get(2)?;
                counts.push(FacetCount {
                    kind: parse_facet_kind(&dimension)?,
                    value: row.get(1)?,
                    read_count: to_u64(read_count, "read_count")?,
                });
            }
            Ok(counts)
        })
        .await
    }

    /// How many live galleries carry a value, served from the
    /// membership index.
    pub async fn gallery_count_for_facet(&self, kind: FacetKind, value: &str) -> Result<u64> {
        let value = value.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM gallery_facets
                 WHERE dimension = ?1 AND value = ?2",
                params![kind.as_str(), value],
                |row| row.get(0),
            )?;
            to_u64(count, "gallery count")
        })
        .await
    }

    /// Gallery ids carrying a value, most-read first, for drill-down
    /// listings under a facet card.
    pub async fn galleries_for_facet(
        &self,
        kind: FacetKind,
        value: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<String>> {
        let value = value.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT gf.gallery_id FROM gallery_facets gf
                 JOIN galleries g ON g.gallery_id = gf.gallery_id
                 WHERE gf.dimension = ?1 AND gf.value = ?2
                 ORDER BY g.read_count DESC, g.gallery_id ASC
                 LIMIT ?3 OFFSET ?4",
            )?;

            let mut rows = stmt.query(params![
                kind.as_str(),
                value,
                i64::from(limit),
                i64::from(offset)
            ])?;
            let mut gallery_ids = Vec::new();
            while let Some(row) = rows.next()? {
                gallery_ids.push(row.get::<_, String>(0)?);
            }
            Ok(gallery_ids)
        })
        .await
    }

    pub async fn count_facet_values(&self, kind: FacetKind) -> Result<u64> {
        self.execute(move |conn| FacetRepository::new(conn).count_values(kind))
            .await
    }
}
