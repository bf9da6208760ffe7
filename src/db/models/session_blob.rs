use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous run of read events less than the clustering gap apart.
///
/// `start_time`/`end_time` always equal the min/max timestamp of the
/// events referencing this blob; a blob with no referencing events is
/// deleted rather than kept empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBlob {
    pub blob_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SessionBlob {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}
