use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::FacetKind;

/// The five ordered tag lists scraped from a gallery page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetLists {
    pub parodies: Vec<String>,
    pub characters: Vec<String>,
    pub tags: Vec<String>,
    pub artists: Vec<String>,
    pub languages: Vec<String>,
}

impl FacetLists {
    pub fn get(&self, kind: FacetKind) -> &[String] {
        match kind {
            FacetKind::Parody => &self.parodies,
            FacetKind::Character => &self.characters,
            FacetKind::Tag => &self.tags,
            FacetKind::Artist => &self.artists,
            FacetKind::Language => &self.languages,
        }
    }

    pub fn is_empty(&self) -> bool {
        FacetKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }
}

/// What the page scraper hands the engine for one finished read:
/// the gallery metadata as it looked at scrape time, plus when the
/// read happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySnapshot {
    pub gallery_id: String,
    pub title: String,
    pub thumb: String,
    pub pages: u32,
    pub facets: FacetLists,
    pub timestamp: DateTime<Utc>,
}

/// Denormalized per-gallery record. Metadata fields hold the most recent
/// snapshot, not history: every new read of the same gallery overwrites
/// them. `read_count` stays >= 1 while the row exists; reaching zero
/// deletes the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryAggregate {
    pub gallery_id: String,
    pub title: String,
    pub thumb: String,
    pub pages: u32,
    pub facets: FacetLists,
    pub read_count: u64,
}

impl GalleryAggregate {
    /// A fresh aggregate for the first recorded read of a gallery.
    pub fn from_snapshot(snapshot: &GallerySnapshot) -> Self {
        Self {
            gallery_id: snapshot.gallery_id.clone(),
            title: snapshot.title.clone(),
            thumb: snapshot.thumb.clone(),
            pages: snapshot.pages,
            facets: snapshot.facets.clone(),
            read_count: 1,
        }
    }
}
