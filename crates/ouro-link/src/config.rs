//! TOML configuration for the feed adapters.
//!
//! Looked up at `--config`, then `OURO_CONFIG`, then
//! `<data dir>/ouroboros.toml`. Every field has a default, so a missing file
//! at the data-dir location yields a usable config; a named file that is
//! missing is an error. Endpoint URLs can be overridden from the environment.

use std::path::{Path, PathBuf};

use ouro_core::GridConfig;
use ouro_core::constants::{GEOPOSITION_TIMEOUT_MS, SECTOR_CAPACITY, TOTAL_SECTORS};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "ouroboros.toml";
pub const DEFAULT_WEATHER_URL: &str =
    "https://data.weather.gov.hk/weatherAPI/opendata/weather.php?dataType=rhrread&lang=en";

/// Environment variables that override endpoint URLs.
const ENV_OVERRIDES: [&str; 4] = [
    "OURO_SNAPSHOT_URL",
    "OURO_STREAM_URL",
    "OURO_WEATHER_URL",
    "OURO_POSITION_URL",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub sector_capacity: u64,
    pub total_sectors: usize,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            sector_capacity: SECTOR_CAPACITY,
            total_sectors: TOTAL_SECTORS,
        }
    }
}

/// Fixed device coordinates. When set, no position lookup is made.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPosition {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bulk snapshot endpoint. No bulk load when unset.
    pub snapshot_url: Option<String>,
    /// Server-sent events endpoint. No push subscription when unset.
    pub stream_url: Option<String>,
    pub weather_url: String,
    pub position_url: Option<String>,
    pub position: Option<FixedPosition>,
    pub request_timeout_secs: u64,
    pub geoposition_timeout_ms: u64,
    /// Periodic weather rescan. 0 disables it.
    pub weather_interval_secs: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub grid: GridSection,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            snapshot_url: None,
            stream_url: None,
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            position_url: None,
            position: None,
            request_timeout_secs: 10,
            geoposition_timeout_ms: GEOPOSITION_TIMEOUT_MS,
            weather_interval_secs: 600,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            grid: GridSection::default(),
        }
    }
}

/// Base directory for runtime files: `OURO_DATA_DIR`, else `~/.ouroboros`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OURO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".ouroboros"))
        .unwrap_or_else(|_| PathBuf::from(".ouroboros"))
}

/// Where the config file lives, and whether someone named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Set for `--config` and `OURO_CONFIG`; a named file must exist.
    pub named: bool,
}

/// Resolve where the config file lives.
pub fn config_path(explicit: Option<&Path>) -> ConfigLocation {
    resolve_config_path(explicit, |key| std::env::var(key).ok())
}

fn resolve_config_path(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigLocation {
    if let Some(path) = explicit {
        return ConfigLocation {
            path: path.to_path_buf(),
            named: true,
        };
    }
    if let Some(path) = lookup("OURO_CONFIG").filter(|p| !p.trim().is_empty()) {
        return ConfigLocation {
            path: PathBuf::from(path),
            named: true,
        };
    }
    ConfigLocation {
        path: data_dir().join(CONFIG_FILE),
        named: false,
    }
}

impl LinkConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from disk and apply environment overrides. A missing file is only
    /// an error when the path was named by `--config` or `OURO_CONFIG`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    fn load_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let location = resolve_config_path(explicit, &lookup);
        let mut config = match std::fs::read_to_string(&location.path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !location.named => {
                tracing::debug!(path = %location.path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env(lookup);
        Ok(config)
    }

    /// Apply endpoint overrides through `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match key {
                "OURO_SNAPSHOT_URL" => self.snapshot_url = Some(value),
                "OURO_STREAM_URL" => self.stream_url = Some(value),
                "OURO_WEATHER_URL" => self.weather_url = value,
                _ => self.position_url = Some(value),
            }
        }
    }

    pub fn grid(&self) -> GridConfig {
        GridConfig {
            sector_capacity: self.grid.sector_capacity,
            total_sectors: self.grid.total_sectors,
        }
    }
}
