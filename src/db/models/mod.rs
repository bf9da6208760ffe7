pub mod facet;
pub mod gallery;
pub mod read_event;
pub mod session_blob;

pub use facet::{FacetCount, FacetKind};
pub use gallery::{FacetLists, GalleryAggregate, GallerySnapshot};
pub use read_event::ReadEvent;
pub use session_blob::SessionBlob;
