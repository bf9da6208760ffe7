use chrono::Duration;

/// Configuration for session-blob clustering.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Maximum gap between a blob's end and a new read for the read to
    /// join that blob. Reads further apart start a new blob.
    pub gap: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            gap: Duration::hours(1),
        }
    }
}
