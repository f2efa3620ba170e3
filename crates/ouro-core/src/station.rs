//! Nearest weather station lookup.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_STATION;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Station {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
        }
    }
}

/// Stations reported by the weather provider, in preference order.
pub const STATIONS: [(&str, f64, f64); 3] = [
    ("HK Observatory", 22.302, 114.174),
    ("Tai Po", 22.446, 114.179),
    ("Sha Tin", 22.403, 114.210),
];

pub fn default_stations() -> Vec<Station> {
    STATIONS
        .iter()
        .map(|(name, lat, lon)| Station::new(name, *lat, *lon))
        .collect()
}

/// Name of the station closest to (`lat`, `lon`).
///
/// Plain Euclidean distance on raw degrees. A later station only replaces the
/// current best when strictly closer, so ties go to the first listed.
pub fn nearest(lat: f64, lon: f64, stations: &[Station]) -> String {
    let mut best: Option<(&Station, f64)> = None;
    for station in stations {
        let dist = ((station.lat - lat).powi(2) + (station.lon - lon).powi(2)).sqrt();
        if best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((station, dist));
        }
    }
    best.map(|(s, _)| s.name.clone())
        .unwrap_or_else(|| DEFAULT_STATION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_position_keeps_first_station() {
        let stations = default_stations();
        assert_eq!(nearest(f64::NAN, 114.2, &stations), "HK Observatory");
        assert_eq!(nearest(22.4, f64::NAN, &stations), "HK Observatory");
    }

    #[test]
    fn test_exact_station() {
        let stations = default_stations();
        assert_eq!(nearest(22.446, 114.179, &stations), "Tai Po");
        assert_eq!(nearest(22.403, 114.210, &stations), "Sha Tin");
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let stations = vec![Station::new("A", 0.0, 1.0), Station::new("B", 0.0, -1.0)];
        assert_eq!(nearest(0.0, 0.0, &stations), "A");

        let reversed = vec![Station::new("B", 0.0, -1.0), Station::new("A", 0.0, 1.0)];
        assert_eq!(nearest(0.0, 0.0, &reversed), "B");
    }

    #[test]
    fn test_far_away_still_resolves() {
        assert_eq!(nearest(51.5, -0.12, &default_stations()), "Tai Po");
    }

    #[test]
    fn test_empty_list_is_default() {
        assert_eq!(nearest(22.3, 114.1, &[]), "HK Observatory");
    }
}
