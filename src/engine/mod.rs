//! The mutation engine: sole writer for reads, blobs, galleries, and
//! facet counters.
//!
//! Each operation runs as one transaction on the database worker thread,
//! so concurrent callers see either all of a mutation or none of it.
//! Presentation collaborators read through the `Database` view methods
//! and never mutate.

pub mod restore;

pub use restore::RestoreToken;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::clustering::{self, ClusterConfig};
use crate::db::models::{FacetKind, GalleryAggregate, GallerySnapshot, ReadEvent, SessionBlob};
use crate::db::repositories::{BlobRepository, FacetRepository, GalleryRepository, ReadRepository};
use crate::db::Database;
use crate::error::HistoryError;
use crate::log_warn;
use restore::RestoreStateV1;

const ENABLE_LOGS: bool = true;

#[derive(Clone)]
pub struct HistoryEngine {
    db: Database,
    config: ClusterConfig,
}

impl HistoryEngine {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, ClusterConfig::default())
    }

    pub fn with_config(db: Database, config: ClusterConfig) -> Self {
        Self { db, config }
    }

    /// The underlying store, for the read-only view queries.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record one read from a scraped gallery snapshot: resolve or extend
    /// the session blob, append the read event, upsert the gallery
    /// aggregate (latest snapshot wins), and bump one facet counter per
    /// listed value.
    ///
    /// Not idempotent: calling twice records two reads.
    pub async fn add_read(&self, snapshot: GallerySnapshot) -> Result<ReadEvent, HistoryError> {
        let config = self.config.clone();
        self.db
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let read = apply_add_read(&tx, &config, &snapshot)?;
                tx.commit().context("failed to commit add_read")?;
                Ok(read)
            })
            .await
            .map_err(HistoryError::from_internal)
    }

    /// Remove a read event and roll its contribution out of the gallery
    /// aggregate, facet counters, and session blob. Returns a token that
    /// [`restore_read`](Self::restore_read) can replay to undo this.
    pub async fn delete_read(&self, read_id: &str) -> Result<RestoreToken, HistoryError> {
        let read_id = read_id.to_string();
        self.db
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let token = apply_delete_read(&tx, &read_id)?;
                tx.commit().context("failed to commit delete_read")?;
                Ok(token)
            })
            .await
            .map_err(HistoryError::from_internal)
    }

    /// Logical inverse of [`delete_read`](Self::delete_read). Composes
    /// additively with mutations that happened since the delete rather
    /// than clobbering them; replaying the same token again is a no-op.
    pub async fn restore_read(&self, token: RestoreToken) -> Result<(), HistoryError> {
        self.db
            .execute(move |conn| {
                let tx = conn.transaction()?;
                apply_restore_read(&tx, &token)?;
                tx.commit().context("failed to commit restore_read")?;
                Ok(())
            })
            .await
            .map_err(HistoryError::from_internal)
    }

    /// Current read count for one facet value; zero when absent.
    pub async fn query_counts(&self, kind: FacetKind, value: &str) -> Result<u64, HistoryError> {
        self.db
            .facet_read_count(kind, value)
            .await
            .map_err(HistoryError::from_internal)
    }
}

/// Join the latest blob still within the gap, widening its bounds, or
/// start a new single-read blob.
fn assign_blob(conn: &Connection, config: &ClusterConfig, timestamp: DateTime<Utc>) -> Result<String> {
    let blobs = BlobRepository::new(conn);
    let candidates = blobs.candidates_since(timestamp - config.gap)?;

    match clustering::pick_target_blob(&candidates) {
        Some(target) => {
            let mut blob = target.clone();
            clustering::extend_bounds(&mut blob, timestamp);
            blobs.update_bounds(&blob.blob_id, blob.start_time, blob.end_time)?;
            Ok(blob.blob_id)
        }
        None => {
            let blob = SessionBlob {
                blob_id: Uuid::new_v4().to_string(),
                start_time: timestamp,
                end_time: timestamp,
            };
            blobs.insert(&blob)?;
            Ok(blob.blob_id)
        }
    }
}

fn apply_add_read(
    conn: &Connection,
    config: &ClusterConfig,
    snapshot: &GallerySnapshot,
) -> Result<ReadEvent> {
    let blob_id = assign_blob(conn, config, snapshot.timestamp)?;

    let read = ReadEvent {
        read_id: Uuid::new_v4().to_string(),
        gallery_id: snapshot.gallery_id.clone(),
        blob_id,
        timestamp: snapshot.timestamp,
    };
    ReadRepository::new(conn).insert(&read)?;

    let galleries = GalleryRepository::new(conn);
    let facets = FacetRepository::new(conn);
    match galleries.get(&snapshot.gallery_id)? {
        Some(existing) => {
            let mut updated = GalleryAggregate::from_snapshot(snapshot);
            updated.read_count = existing.read_count + 1;
            galleries.update(&updated)?;
        }
        None => {
            galleries.insert(&GalleryAggregate::from_snapshot(snapshot))?;
        }
    }
    facets.replace_membership(&snapshot.gallery_id, &snapshot.facets)?;

    for kind in FacetKind::ALL {
        for value in kind.values(&snapshot.facets) {
            facets.increment(kind, value)?;
        }
    }

    Ok(read)
}

fn apply_delete_read(conn: &Connection, read_id: &str) -> Result<RestoreToken> {
    let reads = ReadRepository::new(conn);
    let read = reads.get(read_id)?.ok_or_else(|| {
        anyhow::Error::new(HistoryError::NotFound {
            read_id: read_id.to_string(),
        })
    })?;

    let galleries = GalleryRepository::new(conn);
    let facets = FacetRepository::new(conn);
    let blobs = BlobRepository::new(conn);

    // Pre-decrement snapshot. Later reads overwrite the facet lists, so
    // this is the only record of which values to decrement (and, once in
    // the token, to re-increment on restore).
    let gallery = galleries.get(&read.gallery_id)?;
    if gallery.is_none() {
        log_warn!(
            "no gallery aggregate {} for read {}",
            read.gallery_id,
            read.read_id
        );
    }

    reads.delete(read_id)?;

    if let Some(gallery) = &gallery {
        if gallery.read_count <= 1 {
            galleries.delete(&gallery.gallery_id)?;
            facets.clear_membership(&gallery.gallery_id)?;
        } else {
            galleries.set_read_count(&gallery.gallery_id, gallery.read_count - 1)?;
        }
        for kind in FacetKind::ALL {
            for value in kind.values(&gallery.facets) {
                facets.decrement(kind, value)?;
            }
        }
    }

    match blobs.get(&read.blob_id)? {
        Some(_) => {
            let remaining = reads.timestamps_for_blob(&read.blob_id)?;
            match clustering::recompute_bounds(&remaining) {
                Some((start_time, end_time)) => {
                    blobs.update_bounds(&read.blob_id, start_time, end_time)?;
                }
                None => {
                    blobs.delete(&read.blob_id)?;
                }
            }
        }
        None => {
            log_warn!("no blob {} for deleted read {}", read.blob_id, read.read_id);
        }
    }

    Ok(RestoreToken::V1(RestoreStateV1 { read, gallery }))
}

fn apply_restore_read(conn: &Connection, token: &RestoreToken) -> Result<()> {
    let RestoreToken::V1(state) = token;
    let reads = ReadRepository::new(conn);

    if reads.exists(&state.read.read_id)? {
        log_warn!(
            "read {} already present; treating restore as a replay",
            state.read.read_id
        );
        return Ok(());
    }
    reads.insert(&state.read)?;

    let blobs = BlobRepository::new(conn);
    match blobs.get(&state.read.blob_id)? {
        Some(mut blob) => {
            clustering::extend_bounds(&mut blob, state.read.timestamp);
            blobs.update_bounds(&blob.blob_id, blob.start_time, blob.end_time)?;
        }
        None => {
            blobs.insert(&SessionBlob {
                blob_id: state.read.blob_id.clone(),
                start_time: state.read.timestamp,
                end_time: state.read.timestamp,
            })?;
        }
    }

    let galleries = GalleryRepository::new(conn);
    let facets = FacetRepository::new(conn);
    match &state.gallery {
        Some(captured) => {
            match galleries.get(&captured.gallery_id)? {
                Some(existing) => {
                    galleries.set_read_count(&existing.gallery_id, existing.read_count + 1)?;
                }
                None => {
                    let mut restored = captured.clone();
                    restored.read_count = 1;
                    galleries.insert(&restored)?;
                    facets.replace_membership(&restored.gallery_id, &restored.facets)?;
                }
            }
            for kind in FacetKind::ALL {
                for value in kind.values(&captured.facets) {
                    facets.increment(kind, value)?;
                }
            }
        }
        None => {
            log_warn!(
                "restore token for read {} carries no gallery snapshot",
                state.read.read_id
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::db::models::FacetLists;

    fn ms(value: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(value).unwrap()
    }

    fn engine() -> HistoryEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        HistoryEngine::new(Database::new_in_memory().unwrap())
    }

    fn snapshot(gallery_id: &str, tags: &[&str], timestamp: i64) -> GallerySnapshot {
        GallerySnapshot {
            gallery_id: gallery_id.to_string(),
            title: format!("Gallery {gallery_id}"),
            thumb: format!("https://t.example/{gallery_id}/cover.jpg"),
            pages: 24,
            facets: FacetLists {
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                ..FacetLists::default()
            },
            timestamp: ms(timestamp),
        }
    }

    #[tokio::test]
    async fn reads_within_gap_share_a_blob() {
        let engine = engine();
        let db = engine.database();

        let first = engine.add_read(snapshot("1", &[], 0)).await.unwrap();
        let second = engine.add_read(snapshot("1", &[], 1_800_000)).await.unwrap();
        // 3,700,000ms after the blob's end: past the one hour gap.
        let third = engine.add_read(snapshot("1", &[], 5_500_000)).await.unwrap();

        assert_eq!(first.blob_id, second.blob_id);
        assert_ne!(first.blob_id, third.blob_id);
        assert_eq!(db.count_blobs().await.unwrap(), 2);

        let session = db.get_blob(&first.blob_id).await.unwrap().unwrap();
        assert_eq!(session.start_time, ms(0));
        assert_eq!(session.end_time, ms(1_800_000));

        let newer = db.get_blob(&third.blob_id).await.unwrap().unwrap();
        assert_eq!(newer.start_time, ms(5_500_000));
        assert_eq!(newer.end_time, ms(5_500_000));
    }

    #[tokio::test]
    async fn read_exactly_at_gap_boundary_still_joins() {
        let engine = engine();

        let first = engine.add_read(snapshot("1", &[], 0)).await.unwrap();
        let second = engine.add_read(snapshot("1", &[], 3_600_000)).await.unwrap();
        assert_eq!(first.blob_id, second.blob_id);
    }

    #[tokio::test]
    async fn out_of_order_read_pulls_blob_start_down() {
        let engine = engine();

        let first = engine.add_read(snapshot("1", &[], 10_000)).await.unwrap();
        let second = engine.add_read(snapshot("1", &[], 4_000)).await.unwrap();
        assert_eq!(first.blob_id, second.blob_id);

        let blob = engine
            .database()
            .get_blob(&first.blob_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.start_time, ms(4_000));
        assert_eq!(blob.end_time, ms(10_000));
    }

    #[tokio::test]
    async fn latest_snapshot_wins_and_counters_accumulate() {
        let engine = engine();

        engine
            .add_read(snapshot("526494", &["romance"], 1_000))
            .await
            .unwrap();
        engine
            .add_read(snapshot("526494", &["romance", "comedy"], 2_000))
            .await
            .unwrap();

        let gallery = engine
            .database()
            .get_gallery("526494")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gallery.read_count, 2);
        assert_eq!(gallery.facets.tags, vec!["romance", "comedy"]);

        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 2);
        assert_eq!(engine.query_counts(FacetKind::Tag, "comedy").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_a_read_reverts_counters_and_blob_bounds() {
        let engine = engine();
        let db = engine.database();

        let first = engine
            .add_read(snapshot("526494", &["romance"], 1_000))
            .await
            .unwrap();
        let second = engine
            .add_read(snapshot("526494", &["romance", "comedy"], 2_000))
            .await
            .unwrap();
        assert_eq!(first.blob_id, second.blob_id);

        engine.delete_read(&second.read_id).await.unwrap();

        let gallery = db.get_gallery("526494").await.unwrap().unwrap();
        assert_eq!(gallery.read_count, 1);

        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 1);
        // Comedy dropped to zero, which deletes the counter outright.
        assert_eq!(engine.query_counts(FacetKind::Tag, "comedy").await.unwrap(), 0);

        let blob = db.get_blob(&first.blob_id).await.unwrap().unwrap();
        assert_eq!(blob.start_time, ms(1_000));
        assert_eq!(blob.end_time, ms(1_000));
    }

    #[tokio::test]
    async fn deleting_the_only_read_removes_every_structure() {
        let engine = engine();
        let db = engine.database();

        let read = engine
            .add_read(snapshot("7", &["romance"], 1_000))
            .await
            .unwrap();
        engine.delete_read(&read.read_id).await.unwrap();

        assert_eq!(db.count_reads().await.unwrap(), 0);
        assert_eq!(db.count_galleries().await.unwrap(), 0);
        assert_eq!(db.count_blobs().await.unwrap(), 0);
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 0);
        assert_eq!(
            db.gallery_count_for_facet(FacetKind::Tag, "romance")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn delete_of_unknown_read_is_not_found() {
        let engine = engine();

        let err = engine.delete_read("missing").await.unwrap_err();
        assert!(matches!(err, HistoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn second_delete_of_same_read_is_not_found() {
        let engine = engine();

        let read = engine.add_read(snapshot("7", &[], 1_000)).await.unwrap();
        engine.delete_read(&read.read_id).await.unwrap();

        let err = engine.delete_read(&read.read_id).await.unwrap_err();
        assert!(matches!(err, HistoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_then_restore_round_trips() {
        let engine = engine();
        let db = engine.database();

        let first = engine
            .add_read(snapshot("526494", &["romance"], 1_000))
            .await
            .unwrap();
        let second = engine
            .add_read(snapshot("526494", &["romance", "comedy"], 2_000))
            .await
            .unwrap();

        let token = engine.delete_read(&second.read_id).await.unwrap();
        engine.restore_read(token).await.unwrap();

        let gallery = db.get_gallery("526494").await.unwrap().unwrap();
        assert_eq!(gallery.read_count, 2);
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 2);
        assert_eq!(engine.query_counts(FacetKind::Tag, "comedy").await.unwrap(), 1);

        let restored = db
            .latest_read_for_gallery("526494")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.read_id, second.read_id);

        let blob = db.get_blob(&first.blob_id).await.unwrap().unwrap();
        assert_eq!(blob.start_time, ms(1_000));
        assert_eq!(blob.end_time, ms(2_000));
    }

    #[tokio::test]
    async fn restoring_the_only_read_recreates_gallery_and_blob() {
        let engine = engine();
        let db = engine.database();

        let read = engine
            .add_read(snapshot("7", &["romance"], 1_000))
            .await
            .unwrap();
        let token = engine.delete_read(&read.read_id).await.unwrap();
        assert_eq!(db.count_blobs().await.unwrap(), 0);

        engine.restore_read(token).await.unwrap();

        let gallery = db.get_gallery("7").await.unwrap().unwrap();
        assert_eq!(gallery.read_count, 1);
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 1);
        assert_eq!(
            db.gallery_count_for_facet(FacetKind::Tag, "romance")
                .await
                .unwrap(),
            1
        );

        let blob = db.get_blob(&read.blob_id).await.unwrap().unwrap();
        assert_eq!(blob.start_time, ms(1_000));
        assert_eq!(blob.end_time, ms(1_000));
    }

    #[tokio::test]
    async fn replaying_a_restore_token_is_a_noop() {
        let engine = engine();

        let read = engine
            .add_read(snapshot("7", &["romance"], 1_000))
            .await
            .unwrap();
        let token = engine.delete_read(&read.read_id).await.unwrap();

        engine.restore_read(token.clone()).await.unwrap();
        engine.restore_read(token).await.unwrap();

        let gallery = engine.database().get_gallery("7").await.unwrap().unwrap();
        assert_eq!(gallery.read_count, 1);
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restore_composes_additively_with_later_reads() {
        let engine = engine();
        let db = engine.database();

        let first = engine
            .add_read(snapshot("7", &["romance"], 1_000))
            .await
            .unwrap();
        let token = engine.delete_read(&first.read_id).await.unwrap();

        // A new read lands between the delete and the undo.
        engine
            .add_read(snapshot("7", &["romance"], 2_000))
            .await
            .unwrap();
        engine.restore_read(token).await.unwrap();

        let gallery = db.get_gallery("7").await.unwrap().unwrap();
        assert_eq!(gallery.read_count, 2);
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 2);
        assert_eq!(db.count_reads().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn facet_counts_span_galleries() {
        let engine = engine();
        let db = engine.database();

        engine.add_read(snapshot("1", &["romance"], 0)).await.unwrap();
        let other = engine
            .add_read(snapshot("2", &["romance"], 1_000))
            .await
            .unwrap();

        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 2);
        assert_eq!(
            db.gallery_count_for_facet(FacetKind::Tag, "romance")
                .await
                .unwrap(),
            2
        );

        engine.delete_read(&other.read_id).await.unwrap();
        assert_eq!(engine.query_counts(FacetKind::Tag, "romance").await.unwrap(), 1);
        assert_eq!(
            db.gallery_count_for_facet(FacetKind::Tag, "romance")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn recent_reads_come_back_newest_first() {
        let engine = engine();

        engine.add_read(snapshot("1", &[], 1_000)).await.unwrap();
        engine.add_read(snapshot("2", &[], 3_000)).await.unwrap();
        engine.add_read(snapshot("3", &[], 2_000)).await.unwrap();

        let reads = engine.database().list_recent_reads(0, 10).await.unwrap();
        let order: Vec<&str> = reads.iter().map(|r| r.gallery_id.as_str()).collect();
        assert_eq!(order, vec!["2", "3", "1"]);
    }
}
