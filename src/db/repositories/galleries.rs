use anyhow::Result;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_list, serialize_list, to_i64, to_u64},
    models::{FacetLists, GalleryAggregate},
};

fn row_to_gallery(row: &Row) -> Result<GalleryAggregate> {
    let pages: i64 = row.get("pages")?;
    let read_count: i64 = row.get("read_count")?;
    let parodies: String = row.get("parodies")?;
    let characters: String = row.get("characters")?;
    let tags: String = row.get("tags")?;
    let artists: String = row.get("artists")?;
    let languages: String = row.get("languages")?;

    Ok(GalleryAggregate {
        gallery_id: row.get("gallery_id")?,
        title: row.get("title")?,
        thumb: row.get("thumb")?,
        pages: to_u64(pages, "pages")? as u32,
        facets: FacetLists {
            parodies: parse_list(&parodies, "parodies")?,
            characters: parse_list(&characters, "characters")?,
            tags: parse_list(&tags, "tags")?,
            artists: parse_list(&artists, "artists")?,
            languages: parse_list(&languages, "languages")?,
        },
        read_count: to_u64(read_count, "read_count")?,
    })
}

const SELECT_COLUMNS: &str = "gallery_id, title, thumb, pages, \
     parodies, characters, tags, artists, languages, read_count";

pub struct GalleryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> GalleryRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, gallery_id: &str) -> Result<Option<GalleryAggregate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM galleries WHERE gallery_id = ?1"
        ))?;

        let mut rows = stmt.query(params![gallery_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_gallery(row)?)),
            None => Ok(None),
        }
    }

    pub fn insert(&self, gallery: &GalleryAggregate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO galleries (gallery_id, title, thumb, pages,
                 parodies, characters, tags, artists, languages, read_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                gallery.gallery_id,
                gallery.title,
                gallery.thumb,
                i64::from(gallery.pages),
                serialize_list(&gallery.facets.parodies)?,
                serialize_list(&gallery.facets.characters)?,
                serialize_list(&gallery.facets.tags)?,
                serialize_list(&gallery.facets.artists)?,
                serialize_list(&gallery.facets.languages)?,
                to_i64(gallery.read_count)?,
            ],
        )?;
        Ok(())
    }

    /// Full overwrite: metadata fields always hold the latest snapshot.
    pub fn update(&self, gallery: &GalleryAggregate) -> Result<()> {
        self.conn.execute(
            "UPDATE galleries
             SET title = ?1, thumb = ?2, pages = ?3,
                 parodies = ?4, characters = ?5, tags = ?6,
                 artists = ?7, languages = ?8, read_count = ?9
             WHERE gallery_id = ?10",
            params![
                gallery.title,
                gallery.thumb,
                i64::from(gallery.pages),
                serialize_list(&gallery.facets.parodies)?,
                serialize_list(&gallery.facets.characters)?,
                serialize_list(&gallery.facets.tags)?,
                serialize_list(&gallery.facets.artists)?,
                serialize_list(&gallery.facets.languages)?,
                to_i64(gallery.read_count)?,
                gallery.gallery_id,
            ],
        )?;
        Ok(())
    }

    pub fn set_read_count(&self, gallery_id: &str, read_count: u64) -> Result<()> {
        self.conn.execute(
            "UPDATE galleries SET read_count = ?1 WHERE gallery_id = ?2",
            params![to_i64(read_count)?, gallery_id],
        )?;
        Ok(())
    }

    pub fn delete(&self, gallery_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM galleries WHERE gallery_id = ?1",
            params![gallery_id],
        )?;
        Ok(affected > 0)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM galleries", [], |row| row.get(0))?;
        to_u64(count, "gallery count")
    }
}

impl Database {
    pub async fn get_gallery(&self, gallery_id: &str) -> Result<Option<GalleryAggregate>> {
        let gallery_id = gallery_id.to_string();
        self.execute(move |conn| GalleryRepository::new(conn).get(&gallery_id))
            .await
    }

    /// Bulk point lookup used to join a page of reads to their covers.
    /// Missing ids are skipped, not errors.
    pub async fn get_galleries(&self, gallery_ids: &[String]) -> Result<Vec<GalleryAggregate>> {
        let gallery_ids = gallery_ids.to_vec();
        self.execute(move |conn| {
            let repo = GalleryRepository::new(conn);
            let mut galleries = Vec::with_capacity(gallery_ids.len());
            for gallery_id in &gallery_ids {
                if let Some(gallery) = repo.get(gallery_id)? {
                    galleries.push(gallery);
                }
            }
            Ok(galleries)
        })
        .await
    }

    /// Galleries by read count descending, for the stats leaderboard.
    pub async fn top_galleries(&self, offset: u32, limit: u32) -> Result<Vec<GalleryAggregate>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM galleries
                 ORDER BY read_count DESC, gallery_id ASC
                 LIMIT ?1 OFFSET ?2"
            ))?;

            let mut rows = stmt.query(params![i64::from(limit), i64::from(offset)])?;
            let mut galleries = Vec::new();
            while let Some(row) = rows.next()? {
                galleries.push(row_to_gallery(row)?);
            }
            Ok(galleries)
        })
        .await
    }

    pub async fn count_galleries(&self) -> Result<u64> {
        self.execute(|conn| GalleryRepository::new(conn).count())
            .await
    }
}
