//! Weather provider client (HK Observatory `rhrread` report).

use std::time::Duration;

use ouro_core::constants::{
    DEFAULT_CONDITION_CODE, DEFAULT_HUMIDITY, DEFAULT_STATION, DEFAULT_TEMPERATURE_C,
};
use ouro_core::{WeatherReading, default_stations, nearest, value_as_f64};
use serde_json::Value;

use crate::config::FixedPosition;
use crate::error::Result;

pub struct WeatherClient {
    http: reqwest::Client,
    url: String,
}

impl WeatherClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Fetch the current report and resolve it for `position`.
    pub async fn scan(&self, position: Option<FixedPosition>) -> Result<WeatherReading> {
        let report: Value = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let station = position.map(|p| nearest(p.lat, p.lon, &default_stations()));
        let reading = resolve_reading(&report, station.as_deref());
        tracing::debug!(
            station = %reading.station_name,
            temperature = reading.temperature_c,
            icon = reading.condition_code,
            "weather scanned"
        );
        Ok(reading)
    }
}

/// Pick the reading for `station` out of a report.
///
/// Without a located station the default one is used. A station missing from
/// the report falls back to the first sample, then to the default
/// temperature; the reported station name stays the requested one.
pub fn resolve_reading(report: &Value, station: Option<&str>) -> WeatherReading {
    let target = station.unwrap_or(DEFAULT_STATION);
    let samples = report
        .pointer("/temperature/data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let temperature_c = samples
        .iter()
        .find(|s| s.get("place").and_then(Value::as_str) == Some(target))
        .or_else(|| samples.first())
        .and_then(|s| s.get("value"))
        .and_then(value_as_f64)
        .unwrap_or(DEFAULT_TEMPERATURE_C);

    let condition_code = report
        .pointer("/icon/0")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_CONDITION_CODE);

    let humidity = report
        .pointer("/humidity/data/0/value")
        .and_then(value_as_f64)
        .unwrap_or(DEFAULT_HUMIDITY);

    WeatherReading {
        temperature_c,
        condition_code,
        humidity,
        station_name: target.to_string(),
        location_locked: station.is_some(),
    }
}
