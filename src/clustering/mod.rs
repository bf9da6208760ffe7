pub mod algorithm;
pub mod config;

pub use algorithm::{extend_bounds, pick_target_blob, recompute_bounds};
pub use config::ClusterConfig;
