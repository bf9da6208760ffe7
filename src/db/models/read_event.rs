use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded instance of a gallery being read. Immutable once written;
/// the only later mutation is deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEvent {
    pub read_id: String,
    pub gallery_id: String,
    pub blob_id: String,
    pub timestamp: DateTime<Utc>,
}
