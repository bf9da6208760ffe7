pub mod clustering;
pub mod db;
pub mod engine;
pub mod error;
pub mod settings;
mod utils;

pub use clustering::ClusterConfig;
pub use db::models::{
    FacetCount, FacetKind, FacetLists, GalleryAggregate, GallerySnapshot, ReadEvent, SessionBlob,
};
pub use db::Database;
pub use engine::{HistoryEngine, RestoreToken};
pub use error::HistoryError;
pub use settings::{DisplaySettings, ReaderSettings, SettingsPatch, SettingsStore};
