use chrono::{DateTime, Utc};

use crate::db::models::SessionBlob;
use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Choose which candidate blob a new read should join: the one with the
/// latest `end_time`. Candidates are expected to already satisfy the gap
/// rule (`end_time >= timestamp - gap`).
///
/// Two candidates sharing the same `end_time` means blobs overlap, which
/// legitimately never happens; warn and fall back to the smallest blob id
/// so the choice is at least deterministic.
pub fn pick_target_blob(candidates: &[SessionBlob]) -> Option<&SessionBlob> {
    let best = candidates.iter().max_by_key(|blob| blob.end_time)?;
    let mut ties = candidates
        .iter()
        .filter(|blob| blob.end_time == best.end_time);

    let first = ties.next()?;
    if ties.next().is_some() {
        log_warn!(
            "multiple blobs end at {}; picking deterministically",
            best.end_time
        );
        return candidates
            .iter()
            .filter(|blob| blob.end_time == best.end_time)
            .min_by(|a, b| a.blob_id.cmp(&b.blob_id));
    }
    Some(first)
}

/// Widen a blob's bounds to cover `timestamp`. Min/max, never overwrite:
/// an out-of-order read older than `start_time` pulls the start down.
pub fn extend_bounds(blob: &mut SessionBlob, timestamp: DateTime<Utc>) {
    blob.start_time = blob.start_time.min(timestamp);
    blob.end_time = blob.end_time.max(timestamp);
}

/// Bounds over the timestamps still referencing a blob after a delete.
/// `None` means the blob has no events left and must be deleted.
pub fn recompute_bounds(timestamps: &[DateTime<Utc>]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = timestamps.iter().min().copied()?;
    let end = timestamps.iter().max().copied()?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(value: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(value).unwrap()
    }

    fn blob(id: &str, start: i64, end: i64) -> SessionBlob {
        SessionBlob {
            blob_id: id.to_string(),
            start_time: ms(start),
            end_time: ms(end),
        }
    }

    #[test]
    fn picks_latest_ending_blob() {
        let candidates = vec![blob("a", 0, 1_000), blob("b", 2_000, 5_000)];
        assert_eq!(pick_target_blob(&candidates).unwrap().blob_id, "b");
    }

    #[test]
    fn no_candidates_means_new_blob() {
        assert!(pick_target_blob(&[]).is_none());
    }

    #[test]
    fn end_time_tie_resolves_to_smallest_id() {
        let candidates = vec![blob("b", 0, 1_000), blob("a", 500, 1_000)];
        assert_eq!(pick_target_blob(&candidates).unwrap().blob_id, "a");
    }

    #[test]
    fn extend_covers_newer_read() {
        let mut target = blob("a", 1_000, 2_000);
        extend_bounds(&mut target, ms(3_000));
        assert_eq!(target.start_time, ms(1_000));
        assert_eq!(target.end_time, ms(3_000));
    }

    #[test]
    fn out_of_order_read_pulls_start_down() {
        let mut target = blob("a", 1_000, 2_000);
        extend_bounds(&mut target, ms(500));
        assert_eq!(target.start_time, ms(500));
        assert_eq!(target.end_time, ms(2_000));
    }

    #[test]
    fn recompute_uses_min_and_max() {
        let stamps = vec![ms(3_000), ms(1_000), ms(2_000)];
        assert_eq!(recompute_bounds(&stamps), Some((ms(1_000), ms(3_000))));
    }

    #[test]
    fn recompute_with_no_events_is_none() {
        assert_eq!(recompute_bounds(&[]), None);
    }
}
