use serde::{Deserialize, Serialize};

use crate::db::models::{GalleryAggregate, ReadEvent};

/// State captured by a delete, sufficient to reverse it.
///
/// Gallery facet lists are overwritten on every new read, so the
/// pre-decrement aggregate captured here is the only record of which
/// facet values the delete decremented. The gallery slot is empty when
/// the store had already lost the aggregate before the delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStateV1 {
    pub read: ReadEvent,
    pub gallery: Option<GalleryAggregate>,
}

/// Versioned undo token returned by `delete_read` and consumed by
/// `restore_read`. Serializable so UI layers can hold it across the
/// extension's messaging boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "v")]
pub enum RestoreToken {
    #[serde(rename = "1")]
    V1(RestoreStateV1),
}

impl RestoreToken {
    /// The read event this token would bring back.
    pub fn read(&self) -> &ReadEvent {
        match self {
            RestoreToken::V1(state) => &state.read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn token_serialization_carries_version_tag() {
        let token = RestoreToken::V1(RestoreStateV1 {
            read: ReadEvent {
                read_id: "r1".into(),
                gallery_id: "g1".into(),
                blob_id: "b1".into(),
                timestamp: Utc.timestamp_millis_opt(1_000).unwrap(),
            },
            gallery: None,
        });

        let raw = serde_json::to_string(&token).unwrap();
        assert!(raw.contains("\"v\":\"1\""));

        let parsed: RestoreToken = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, token);
    }
}
