//! Wire format for telemetry events.
//!
//! A wire event is `{"source": ..., "payload": ..., "observedAt": ...}`.
//! Legacy metric rows (`{"metric_name": "Anki_Backlog", "value": 12,
//! "timestamp": ...}`) are accepted too; their source comes from the metric
//! name and the payload is `raw_data` when present, else the whole row.

use ouro_core::time::parse_iso8601_millis;
use ouro_core::{Source, TelemetryEvent};
use serde_json::{Map, Value};

use crate::error::{LinkError, Result};

const TIMESTAMP_KEYS: [&str; 4] = ["observedAt", "observed_at", "timestamp", "created_at"];

/// What to stamp when an event carries no upstream timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingStamp {
    /// Bulk rows: epoch, so any timestamped push outranks them.
    Epoch,
    /// Push events: local arrival time.
    Arrival,
}

/// Decode one wire event. `fallback` names the source when the row itself
/// does not, as in a snapshot object keyed by source.
pub fn decode(
    raw: &Value,
    fallback: Option<Source>,
    received_at: u64,
    missing: MissingStamp,
) -> Result<TelemetryEvent> {
    let map = raw
        .as_object()
        .ok_or_else(|| LinkError::InvalidData(format!("wire event is not an object: {raw}")))?;

    let (source, payload) = source_and_payload(map, fallback)?;
    let observed_at = match observed_at(map)? {
        Some(ts) => ts,
        None => match missing {
            MissingStamp::Epoch => 0,
            MissingStamp::Arrival => received_at,
        },
    };

    Ok(TelemetryEvent::new(source, payload, observed_at, received_at))
}

/// Decode a JSON text, as carried by one server-sent event.
pub fn decode_str(text: &str, received_at: u64, missing: MissingStamp) -> Result<TelemetryEvent> {
    let raw: Value = serde_json::from_str(text)?;
    decode(&raw, None, received_at, missing)
}

fn source_and_payload(
    map: &Map<String, Value>,
    fallback: Option<Source>,
) -> Result<(Source, Value)> {
    if let Some(name) = map.get("source").and_then(Value::as_str) {
        let source = Source::from_name(name)
            .ok_or_else(|| LinkError::InvalidData(format!("unknown source: {name}")))?;
        let payload = map
            .get("payload")
            .or_else(|| map.get("value"))
            .cloned()
            .unwrap_or(Value::Null);
        return Ok((source, payload));
    }

    if let Some(metric) = map.get("metric_name").and_then(Value::as_str)
        && let Some(source) = Source::from_name(metric).or(fallback)
    {
        let payload = map
            .get("raw_data")
            .cloned()
            .unwrap_or_else(|| Value::Object(map.clone()));
        return Ok((source, payload));
    }

    match fallback {
        Some(source) => {
            let payload = map
                .get("payload")
                .cloned()
                .unwrap_or_else(|| Value::Object(map.clone()));
            Ok((source, payload))
        }
        None => Err(LinkError::InvalidData(
            "wire event names no source".to_string(),
        )),
    }
}

/// Upstream timestamp in Unix milliseconds, if the row carries one.
fn observed_at(map: &Map<String, Value>) -> Result<Option<u64>> {
    let Some((key, value)) = TIMESTAMP_KEYS
        .iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| parse_iso8601_millis(s)),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| LinkError::InvalidData(format!("unreadable {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_canonical() {
        let raw = json!({"source": "backlog", "payload": 42, "observedAt": "2025-03-01T09:00:00Z"});
        let ev = decode(&raw, None, 99, MissingStamp::Arrival).unwrap();
        assert_eq!(ev.source, Source::Backlog);
        assert_eq!(ev.value, json!(42));
        assert_eq!(ev.observed_at, 1_740_819_600_000);
        assert_eq!(ev.received_at, 99);
    }

    #[test]
    fn test_decode_millis_and_camel_source() {
        let raw = json!({"source": "operatorSignal", "payload": {"color": "RED"}, "observedAt": 1234});
        let ev = decode(&raw, None, 0, MissingStamp::Epoch).unwrap();
        assert_eq!(ev.source, Source::OperatorSignal);
        assert_eq!(ev.observed_at, 1234);
    }

    #[test]
    fn test_missing_timestamp_policy() {
        let raw = json!({"source": "pulse", "payload": 70});
        assert_eq!(decode(&raw, None, 500, MissingStamp::Epoch).unwrap().observed_at, 0);
        assert_eq!(decode(&raw, None, 500, MissingStamp::Arrival).unwrap().observed_at, 500);
    }

    #[test]
    fn test_legacy_metric_rows() {
        let backlog = json!({"metric_name": "Anki_Backlog", "value": 201, "timestamp": 10});
        let ev = decode(&backlog, None, 0, MissingStamp::Epoch).unwrap();
        assert_eq!(ev.source, Source::Backlog);
        assert_eq!(ev.value["value"], 201);

        let physio = json!({"metric_name": "Health_Advice", "raw_data": {"advice": "Sleep: 7h"}});
        let ev = decode(&physio, None, 0, MissingStamp::Epoch).unwrap();
        assert_eq!(ev.source, Source::Biometric);
        assert_eq!(ev.value, json!({"advice": "Sleep: 7h"}));
    }

    #[test]
    fn test_fallback_source_for_keyed_rows() {
        let row = json!({"event_title": "Standup", "end_time": "2025-03-01T10:00:00Z"});
        let ev = decode(&row, Some(Source::Calendar), 0, MissingStamp::Epoch).unwrap();
        assert_eq!(ev.source, Source::Calendar);
        assert_eq!(ev.value, row);
    }

    #[test]
    fn test_rejects_unknown_or_unreadable() {
        assert!(decode(&json!({"source": "stocks"}), None, 0, MissingStamp::Epoch).is_err());
        assert!(decode(&json!({"payload": 1}), None, 0, MissingStamp::Epoch).is_err());
        assert!(decode(&json!([1, 2]), None, 0, MissingStamp::Epoch).is_err());
        let bad_ts = json!({"source": "backlog", "payload": 1, "observedAt": "yesterday"});
        assert!(decode(&bad_ts, None, 0, MissingStamp::Epoch).is_err());
    }

    #[test]
    fn test_decode_str() {
        let ev = decode_str(r#"{"source":"insight","payload":"Hold"}"#, 7, MissingStamp::Arrival).unwrap();
        assert_eq!(ev.source, Source::Insight);
        assert_eq!(ev.observed_at, 7);
        assert!(decode_str("not json", 7, MissingStamp::Arrival).is_err());
    }
}
