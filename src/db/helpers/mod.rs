use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::db::models::FacetKind;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Timestamps are stored as epoch milliseconds so index range scans stay cheap.
pub fn to_epoch_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub fn parse_epoch_ms(value: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value)
        .single()
        .ok_or_else(|| anyhow!("{field} holds out-of-range timestamp {value}"))
}

pub fn parse_facet_kind(value: &str) -> Result<FacetKind> {
    match value {
        "parodies" => Ok(FacetKind::Parody),
        "characters" => Ok(FacetKind::Character),
        "tags" => Ok(FacetKind::Tag),
        "artists" => Ok(FacetKind::Artist),
        "languages" => Ok(FacetKind::Language),
        other => Err(anyhow!("unknown facet dimension {other}")),
    }
}

pub fn serialize_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).map_err(|err| anyhow!("failed to serialize facet list: {err}"))
}

pub fn parse_list(raw: &str, field: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|err| anyhow!("failed to parse {field}: {err}"))
}
