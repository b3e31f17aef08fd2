//! Wire models for the captioning backend.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Kind of lifecycle event posted to `/events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Start,
    End,
    IntervalStart,
    IntervalEnd,
}

/// A performance or interval lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub performance_id: String,
    #[serde(with = "iso_millis")]
    pub active_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl Event {
    /// Event stamped with the current time.
    pub fn now(performance_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            performance_id: performance_id.into(),
            active_time: Utc::now(),
            event_type,
        }
    }
}

/// Marks a caption as shown, sent as `PATCH /captions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPatch {
    pub performance_id: String,
    pub caption_id: String,
    #[serde(with = "iso_millis")]
    pub active_time: DateTime<Utc>,
}

impl CaptionPatch {
    pub fn now(performance_id: impl Into<String>, caption_id: impl Into<String>) -> Self {
        Self {
            performance_id: performance_id.into(),
            caption_id: caption_id.into(),
            active_time: Utc::now(),
        }
    }
}

// Response records require their identifiers. Times and track offsets
// are whatever the backend sent and stay `None` when it omits them.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStart {
    pub performance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEnd {
    pub performance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<String>,
}

/// Interval record returned for `intervalStart` and `intervalEnd` events.
///
/// Track offsets are opaque to the client. Fields the client does not
/// model are kept in `extra`, so the record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    #[serde(default, deserialize_with = "lenient_id_opt", skip_serializing_if = "Option::is_none")]
    pub interval_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_in_track: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_in_track: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionDelivery {
    #[serde(deserialize_with = "lenient_id")]
    pub caption_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_track: Option<Value>,
}

/// Backend `performance` object; only one of the times is present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    #[serde(deserialize_with = "lenient_id")]
    pub performance_id: String,
    #[serde(default)]
    pub actual_start_time: Option<String>,
    #[serde(default)]
    pub actual_end_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceEnvelope {
    pub performance: PerformanceRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalEnvelope {
    pub interval: Interval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionEnvelope {
    pub caption: CaptionDelivery,
}

/// Ids may come back as JSON numbers; keep them as strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn lenient_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-03-01T19:30:00.125Z`.
mod iso_millis {
    use super::*;

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
