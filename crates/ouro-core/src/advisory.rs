//! Rule-based weather advisories.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    COLD_BELOW_C, COOL_BELOW_C, DEFAULT_CONDITION_CODE, DEFAULT_HUMIDITY, DEFAULT_STATION,
    DEFAULT_TEMPERATURE_C, GLARE_CODES, HOT_ABOVE_C, PRECIPITATION_CODE,
};
use crate::event::value_as_f64;

/// Wording for one tip: (combat, civilian).
type Tip = (&'static str, &'static str);

const SHIELD: Tip = ("DEPLOY ION SHIELD", "Bring Umbrella");
const COLD_GEAR: Tip = ("THERMAL ARMOR REQ", "Wear Coat");
const LIGHT_LAYER: Tip = ("LIGHT PLATING", "Light Jacket");
const COOLING: Tip = ("COOLANT FLUSH REQ", "Hydrate");
const EYE_PROTECTION: Tip = ("OCULAR SHIELDING", "Sunglasses");
const OPTIMAL: Tip = ("CONDITIONS OPTIMAL", "Weather Good");

pub const SIGNAL_LOST: &str = "SIGNAL LOST";
pub const OFFLINE_STATION: &str = "OFFLINE";
pub const SCANNING_STATION: &str = "SCANNING...";

fn word(tip: Tip, combat: bool) -> String {
    let (combat_wording, civilian_wording) = tip;
    let chosen = if combat { combat_wording } else { civilian_wording };
    chosen.to_string()
}

/// Ordered directives for the current conditions. Never empty.
///
/// Precipitation and glare rules fire independently; exactly one temperature
/// band applies at most. `combat` only changes the wording.
pub fn advise(temperature_c: f64, condition_code: i64, combat: bool) -> Vec<String> {
    let mut tips = Vec::new();

    if condition_code >= PRECIPITATION_CODE {
        tips.push(word(SHIELD, combat));
    }

    if temperature_c < COLD_BELOW_C {
        tips.push(word(COLD_GEAR, combat));
    } else if temperature_c < COOL_BELOW_C {
        tips.push(word(LIGHT_LAYER, combat));
    } else if temperature_c > HOT_ABOVE_C {
        tips.push(word(COOLING, combat));
    }

    if GLARE_CODES.contains(&condition_code) {
        tips.push(word(EYE_PROTECTION, combat));
    }

    if tips.is_empty() {
        tips.push(word(OPTIMAL, combat));
    }
    tips
}

/// Coarse sky class for the condition icon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionClass {
    Sun,
    Cloud,
    Rain,
    Wind,
}

pub fn condition_class(condition_code: i64) -> ConditionClass {
    match condition_code {
        50..=54 => ConditionClass::Sun,
        60..=65 => ConditionClass::Cloud,
        c if c >= 80 => ConditionClass::Rain,
        _ => ConditionClass::Wind,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherStatus {
    Scanning,
    Online,
    Offline,
}

/// A station reading resolved from the weather provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub temperature_c: f64,
    pub condition_code: i64,
    pub humidity: f64,
    pub station_name: String,
    #[serde(default)]
    pub location_locked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAdvisory {
    pub temperature_c: f64,
    pub condition_code: i64,
    pub humidity: f64,
    pub station_name: String,
    pub location_locked: bool,
    pub condition_class: ConditionClass,
    pub status: WeatherStatus,
    pub tips: Vec<String>,
}

impl WeatherAdvisory {
    /// Advisory for a live reading, worded for the given combat flag.
    pub fn from_reading(reading: &WeatherReading, combat: bool) -> Self {
        Self {
            temperature_c: reading.temperature_c,
            condition_code: reading.condition_code,
            humidity: reading.humidity,
            station_name: reading.station_name.clone(),
            location_locked: reading.location_locked,
            condition_class: condition_class(reading.condition_code),
            status: WeatherStatus::Online,
            tips: advise(reading.temperature_c, reading.condition_code, combat),
        }
    }

    /// Placeholder shown before the first scan completes.
    pub fn scanning() -> Self {
        Self {
            temperature_c: 0.0,
            condition_code: DEFAULT_CONDITION_CODE,
            humidity: 0.0,
            station_name: SCANNING_STATION.to_string(),
            location_locked: false,
            condition_class: ConditionClass::Sun,
            status: WeatherStatus::Scanning,
            tips: Vec::new(),
        }
    }

    /// The provider could not be reached.
    pub fn offline() -> Self {
        Self {
            temperature_c: 0.0,
            condition_code: DEFAULT_CONDITION_CODE,
            humidity: 0.0,
            station_name: OFFLINE_STATION.to_string(),
            location_locked: false,
            condition_class: ConditionClass::Wind,
            status: WeatherStatus::Offline,
            tips: vec![SIGNAL_LOST.to_string()],
        }
    }
}

impl Default for WeatherReading {
    fn default() -> Self {
        Self {
            temperature_c: DEFAULT_TEMPERATURE_C,
            condition_code: DEFAULT_CONDITION_CODE,
            humidity: DEFAULT_HUMIDITY,
            station_name: DEFAULT_STATION.to_string(),
            location_locked: false,
        }
    }
}

impl WeatherReading {
    /// Read a weather event payload. Accepts the camelCase reading shape and
    /// the short `temperature` / `icon` / `station` aliases; needs at least a
    /// temperature.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let number = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(value_as_f64));
        let temperature_c = number(&["temperatureC", "temperature_c", "temperature"])?;
        let station_name = ["stationName", "station_name", "station"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .unwrap_or(DEFAULT_STATION)
            .to_string();
        Some(Self {
            temperature_c,
            condition_code: number(&["conditionCode", "condition_code", "icon"])
                .map(|c| c as i64)
                .unwrap_or(DEFAULT_CONDITION_CODE),
            humidity: number(&["humidity"]).unwrap_or(DEFAULT_HUMIDITY),
            station_name,
            location_locked: map
                .get("locationLocked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}
