//! Current directive from the calendar feed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::{clock_hh_mm, parse_iso8601_millis};

pub const MISSION_PLACEHOLDER: &str = "INITIALIZING...";
pub const CLOCK_PLACEHOLDER: &str = "--:--";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionStatus {
    Active,
    Pending,
}

/// A calendar entry as received, with its bounds in Unix milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub title: String,
    pub start_at: Option<u64>,
    pub end_at: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub title: String,
    /// Wall-clock end, `HH:MM` UTC.
    pub end_time: String,
    pub status: MissionStatus,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            title: MISSION_PLACEHOLDER.to_string(),
            end_time: CLOCK_PLACEHOLDER.to_string(),
            status: MissionStatus::Pending,
        }
    }
}

fn timestamp_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) => parse_iso8601_millis(s),
        Value::Number(n) => n.as_u64(),
        _ => None,
    })
}

impl CalendarEntry {
    /// Read a calendar row. Needs at least a non-empty title.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let title = ["event_title", "title", "summary"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|t| !t.is_empty())?;
        Some(Self {
            title: title.to_string(),
            start_at: timestamp_field(map, &["start_time", "start"]),
            end_at: timestamp_field(map, &["end_time", "end"]),
        })
    }

    /// Active while `start <= now < end`. An entry with only a future end is
    /// treated as already running.
    pub fn resolve(&self, now: u64) -> Mission {
        let status = match (self.start_at, self.end_at) {
            (Some(start), Some(end)) if start <= now && now < end => MissionStatus::Active,
            (None, Some(end)) if now < end => MissionStatus::Active,
            _ => MissionStatus::Pending,
        };
        Mission {
            title: self.title.clone(),
            end_time: self
                .end_at
                .map(clock_hh_mm)
                .unwrap_or_else(|| CLOCK_PLACEHOLDER.to_string()),
            status,
        }
    }
}
