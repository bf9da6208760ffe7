pub mod blobs;
pub mod facets;
pub mod galleries;
pub mod reads;

pub use blobs::BlobRepository;
pub use facets::FacetRepository;
pub use galleries::GalleryRepository;
pub use reads::ReadRepository;
