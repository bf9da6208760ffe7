use serde::{Deserialize, Serialize};

use crate::db::models::FacetLists;

/// The categorical dimensions a gallery can be tagged with.
///
/// Each variant carries its storage tag and the accessor into
/// [`FacetLists`], so per-dimension work iterates `FacetKind::ALL`
/// instead of dispatching on table-name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacetKind {
    #[serde(rename = "parodies")]
    Parody,
    #[serde(rename = "characters")]
    Character,
    #[serde(rename = "tags")]
    Tag,
    #[serde(rename = "artists")]
    Artist,
    #[serde(rename = "languages")]
    Language,
}

impl FacetKind {
    pub const ALL: [FacetKind; 5] = [
        FacetKind::Parody,
        FacetKind::Character,
        FacetKind::Tag,
        FacetKind::Artist,
        FacetKind::Language,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Parody => "parodies",
            FacetKind::Character => "characters",
            FacetKind::Tag => "tags",
            FacetKind::Artist => "artists",
            FacetKind::Language => "languages",
        }
    }

    pub fn values<'a>(&self, lists: &'a FacetLists) -> &'a [String] {
        lists.get(*self)
    }
}

/// Denormalized read count for one facet value. A count reaching zero
/// deletes the row; it is never persisted at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetCount {
    pub kind: FacetKind,
    pub value: String,
    pub read_count: u64,
}
