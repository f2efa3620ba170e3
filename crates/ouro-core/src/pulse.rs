//! Heart-rate classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{PULSE_CRITICAL_BPM, PULSE_DEFAULT_BPM, PULSE_SPIKE_BPM};
use crate::event::value_as_f64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PulseStatus {
    Normal,
    Spike,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PulseReading {
    pub bpm: f64,
    pub status: PulseStatus,
}

impl Default for PulseReading {
    fn default() -> Self {
        Self::from_bpm(PULSE_DEFAULT_BPM)
    }
}

impl PulseReading {
    pub fn from_bpm(bpm: f64) -> Self {
        Self {
            bpm,
            status: classify(bpm),
        }
    }
}

pub fn classify(bpm: f64) -> PulseStatus {
    if bpm > PULSE_CRITICAL_BPM {
        PulseStatus::Critical
    } else if bpm > PULSE_SPIKE_BPM {
        PulseStatus::Spike
    } else {
        PulseStatus::Normal
    }
}

/// Read a heart-rate sample from a pulse payload.
///
/// Accepts a bare number, a numeric string, or an object with `value`. An
/// object that names a `metric_name` must mention heart or pulse.
pub fn sample_bpm(value: &Value) -> Option<f64> {
    if let Value::Object(map) = value
        && let Some(metric) = map.get("metric_name").and_then(Value::as_str)
    {
        let metric = metric.to_ascii_lowercase();
        if !metric.contains("heart") && !metric.contains("pulse") {
            return None;
        }
    }
    value_as_f64(value).filter(|bpm| *bpm >= 0.0)
}
