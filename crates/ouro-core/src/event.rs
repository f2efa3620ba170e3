use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Upstream feed a telemetry event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Calendar,
    Backlog,
    Biometric,
    Weather,
    OperatorSignal,
    Pulse,
    Insight,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::Calendar,
        Source::Backlog,
        Source::Biometric,
        Source::Weather,
        Source::OperatorSignal,
        Source::Pulse,
        Source::Insight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Calendar => "calendar",
            Source::Backlog => "backlog",
            Source::Biometric => "biometric",
            Source::Weather => "weather",
            Source::OperatorSignal => "operator_signal",
            Source::Pulse => "pulse",
            Source::Insight => "insight",
        }
    }

    /// Resolve a feed name. Case and `_`/`-` separators are ignored, and the
    /// upstream metric names (`Anki_Backlog`, `Health_Advice`,
    /// `Combat_Mode_Trigger`) map to their sources.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "calendar" | "calendarcache" | "mission" => Some(Source::Calendar),
            "backlog" | "ankibacklog" => Some(Source::Backlog),
            "biometric" | "bio" | "healthadvice" | "physiology" => Some(Source::Biometric),
            "weather" => Some(Source::Weather),
            "operatorsignal" | "governor" | "signal" | "combatmodetrigger" => {
                Some(Source::OperatorSignal)
            }
            "pulse" | "heartrate" => Some(Source::Pulse),
            "insight" | "insights" | "synapseinsights" => Some(Source::Insight),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized fact from a feed.
///
/// `observed_at` is when the fact became true upstream, `received_at` is
/// local arrival. Both are Unix milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub source: Source,
    pub value: Value,
    pub observed_at: u64,
    pub received_at: u64,
}

impl TelemetryEvent {
    pub fn new(source: Source, value: Value, observed_at: u64, received_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            value,
            observed_at,
            received_at,
        }
    }

    /// An event whose upstream timestamp is unknown: stamped with arrival time.
    pub fn observed_on_arrival(source: Source, value: Value, received_at: u64) -> Self {
        Self::new(source, value, received_at, received_at)
    }
}

/// Coerce a scalar payload to a non-negative count.
/// Numbers are floored, numeric strings parsed, negatives clamp to 0.
pub fn value_as_count(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Object(map) => return map.get("value").and_then(value_as_count),
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.max(0.0).floor() as u64)
}

/// Coerce a scalar payload to a float. Objects are read through `value`.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Object(map) => return map.get("value").and_then(value_as_f64),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_names() {
        assert_eq!(Source::from_name("Anki_Backlog"), Some(Source::Backlog));
        assert_eq!(Source::from_name("operatorSignal"), Some(Source::OperatorSignal));
        assert_eq!(Source::from_name("OPERATOR_SIGNAL"), Some(Source::OperatorSignal));
        assert_eq!(Source::from_name("Combat_Mode_Trigger"), Some(Source::OperatorSignal));
        assert_eq!(Source::from_name("Health_Advice"), Some(Source::Biometric));
        assert_eq!(Source::from_name("stocks"), None);
    }

    #[test]
    fn test_source_display_matches_serde() {
        for source in Source::ALL {
            let json = serde_json::to_value(source).unwrap();
            assert_eq!(json, json!(source.to_string()));
            assert_eq!(Source::from_name(source.as_str()), Some(source));
        }
    }

    #[test]
    fn test_value_as_count() {
        assert_eq!(value_as_count(&json!(201)), Some(201));
        assert_eq!(value_as_count(&json!(12.9)), Some(12));
        assert_eq!(value_as_count(&json!("42")), Some(42));
        assert_eq!(value_as_count(&json!(-5)), Some(0));
        assert_eq!(value_as_count(&json!({"value": 7})), Some(7));
        assert_eq!(value_as_count(&json!("lots")), None);
        assert_eq!(value_as_count(&Value::Null), None);
    }

    #[test]
    fn test_observed_on_arrival() {
        let ev = TelemetryEvent::observed_on_arrival(Source::Pulse, json!(72), 1_000);
        assert_eq!(ev.observed_at, 1_000);
        assert_eq!(ev.received_at, 1_000);
    }
}
