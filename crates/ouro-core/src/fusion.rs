//! Event intake and the read model.
//!
//! [`FusionService`] owns every piece of intake state. Each source keeps the
//! `observed_at` of the value it currently holds; an incoming event replaces
//! it only when it is not older, so a slow bulk fetch can never clobber a
//! newer push. Derived views are recomputed from the held inputs on every
//! [`FusionService::snapshot`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::advisory::{WeatherAdvisory, WeatherReading, WeatherStatus};
use crate::bio::{self, BioMetric};
use crate::constants::{SECTOR_CAPACITY, TOTAL_SECTORS};
use crate::event::{Source, TelemetryEvent, value_as_count};
use crate::governor::{
    GovernorSignal, ModeGovernor, ModeOrigin, SignalColor, SystemMode, ThreatCount, assess_threat,
};
use crate::mission::{CalendarEntry, Mission};
use crate::pulse::{self, PulseReading};
use crate::sector::{SectorOccupancy, SectorState, occupancy};
use crate::time::now_unix_millis;

pub const INSIGHT_PLACEHOLDER: &str = "INITIALIZING STRATEGIST CORE...";

/// Result of offering one event to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Applied,
    /// A newer value from the same source is already held.
    Stale { held: u64, incoming: u64 },
    /// The payload could not be read for its source.
    Ignored { reason: String },
}

impl IngestOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, IngestOutcome::Applied)
    }

    fn ignored(reason: &str) -> Self {
        IngestOutcome::Ignored {
            reason: reason.to_string(),
        }
    }
}

/// Health of one delivery channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    #[default]
    Pending,
    Online,
    Offline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Snapshot,
    Stream,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkHealth {
    pub snapshot: FeedStatus,
    pub stream: FeedStatus,
    pub weather: FeedStatus,
}

/// Sector grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub sector_capacity: u64,
    pub total_sectors: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sector_capacity: SECTOR_CAPACITY,
            total_sectors: TOTAL_SECTORS,
        }
    }
}

/// Everything presentation needs, computed at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadModel {
    pub mode: SystemMode,
    pub mode_origin: ModeOrigin,
    pub combat: bool,
    pub bio_metrics: Vec<BioMetric>,
    pub backlog: Option<u64>,
    pub occupancy: SectorOccupancy,
    pub sectors: Vec<SectorState>,
    pub advisory: WeatherAdvisory,
    pub threat_count: ThreatCount,
    pub mission: Mission,
    pub pulse: PulseReading,
    pub insight: String,
    pub link: LinkHealth,
    pub generated_at: u64,
}

#[derive(Clone, Debug)]
pub struct FusionService {
    grid: GridConfig,
    /// `observed_at` of the value currently held, per source.
    held: HashMap<Source, u64>,
    governor: ModeGovernor,
    backlog: Option<u64>,
    bio_metrics: Vec<BioMetric>,
    weather: Option<WeatherReading>,
    weather_status: WeatherStatus,
    calendar: Option<CalendarEntry>,
    pulse: PulseReading,
    insight: Option<String>,
    link: LinkHealth,
}

impl Default for FusionService {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

impl FusionService {
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            held: HashMap::new(),
            governor: ModeGovernor::new(),
            backlog: None,
            bio_metrics: vec![BioMetric::no_data()],
            weather: None,
            weather_status: WeatherStatus::Scanning,
            calendar: None,
            pulse: PulseReading::default(),
            insight: None,
            link: LinkHealth::default(),
        }
    }

    pub fn mode(&self) -> SystemMode {
        self.governor.mode()
    }

    pub fn governor(&self) -> &ModeGovernor {
        &self.governor
    }

    /// `observed_at` currently held for `source`, if any value was accepted.
    pub fn held_at(&self, source: Source) -> Option<u64> {
        self.held.get(&source).copied()
    }

    /// Offer one event. Older-than-held events are rejected; unreadable
    /// payloads are ignored without touching the held timestamp.
    pub fn ingest(&mut self, event: &TelemetryEvent) -> IngestOutcome {
        if let Some(&held) = self.held.get(&event.source)
            && event.observed_at < held
        {
            return IngestOutcome::Stale {
                held,
                incoming: event.observed_at,
            };
        }

        let outcome = self.apply(event.source, &event.value);
        if outcome.is_applied() {
            self.held.insert(event.source, event.observed_at);
        }
        outcome
    }

    fn apply(&mut self, source: Source, value: &Value) -> IngestOutcome {
        match source {
            Source::Backlog => match value_as_count(value) {
                Some(count) => {
                    self.backlog = Some(count);
                    IngestOutcome::Applied
                }
                None => IngestOutcome::ignored("backlog value is not a count"),
            },
            Source::Biometric => {
                self.bio_metrics = bio::parse(bio::advisory_payload(value));
                IngestOutcome::Applied
            }
            Source::OperatorSignal => {
                self.governor.fold(&GovernorSignal::from_value(value));
                IngestOutcome::Applied
            }
            Source::Weather => match WeatherReading::from_value(value) {
                Some(reading) => {
                    self.weather = Some(reading);
                    self.weather_status = WeatherStatus::Online;
                    self.link.weather = FeedStatus::Online;
                    IngestOutcome::Applied
                }
                None => IngestOutcome::ignored("weather payload has no temperature"),
            },
            Source::Calendar => match CalendarEntry::from_value(value) {
                Some(entry) => {
                    self.calendar = Some(entry);
                    IngestOutcome::Applied
                }
                None => IngestOutcome::ignored("calendar row has no title"),
            },
            Source::Pulse => match pulse::sample_bpm(value) {
                Some(bpm) => {
                    self.pulse = PulseReading::from_bpm(bpm);
                    IngestOutcome::Applied
                }
                None => IngestOutcome::ignored("pulse payload has no heart rate"),
            },
            Source::Insight => match insight_text(value) {
                Some(text) => {
                    self.insight = Some(text);
                    IngestOutcome::Applied
                }
                None => IngestOutcome::ignored("insight payload has no message"),
            },
        }
    }

    /// Manual operator override. `None` toggles between WAR_TIME and NORMAL.
    /// Holds until the next accepted operator signal.
    pub fn override_mode(&mut self, color: Option<SignalColor>) -> SystemMode {
        match color {
            Some(color) => self.governor.override_with(color),
            None => self.governor.toggle(),
        }
    }

    /// A weather scan has started.
    pub fn begin_weather_scan(&mut self) {
        self.weather_status = WeatherStatus::Scanning;
        self.link.weather = FeedStatus::Pending;
    }

    /// The provider answered. Ends a scan even when the fresh reading lost
    /// to a newer held one.
    pub fn weather_online(&mut self) {
        self.weather_status = WeatherStatus::Online;
        self.link.weather = FeedStatus::Online;
    }

    /// The weather provider could not be reached.
    pub fn weather_offline(&mut self) {
        self.weather_status = WeatherStatus::Offline;
        self.link.weather = FeedStatus::Offline;
    }

    pub fn set_feed_status(&mut self, feed: Feed, status: FeedStatus) {
        match feed {
            Feed::Snapshot => self.link.snapshot = status,
            Feed::Stream => self.link.stream = status,
        }
    }

    pub fn snapshot(&self) -> ReadModel {
        self.snapshot_at(now_unix_millis())
    }

    /// Read model as of `now` (Unix milliseconds).
    pub fn snapshot_at(&self, now: u64) -> ReadModel {
        let mode = self.governor.mode();
        let combat = mode.is_combat();
        let occupancy = occupancy(
            self.backlog.unwrap_or(0),
            self.grid.sector_capacity,
            self.grid.total_sectors,
        );

        ReadModel {
            mode,
            mode_origin: self.governor.origin(),
            combat,
            bio_metrics: self.bio_metrics.clone(),
            backlog: self.backlog,
            sectors: occupancy.sectors(),
            occupancy,
            advisory: self.advisory(combat),
            threat_count: assess_threat(self.backlog),
            mission: self
                .calendar
                .as_ref()
                .map(|entry| entry.resolve(now))
                .unwrap_or_default(),
            pulse: self.pulse,
            insight: self
                .insight
                .clone()
                .unwrap_or_else(|| INSIGHT_PLACEHOLDER.to_string()),
            link: self.link,
            generated_at: now,
        }
    }

    fn advisory(&self, combat: bool) -> WeatherAdvisory {
        match (self.weather_status, &self.weather) {
            (WeatherStatus::Offline, _) => WeatherAdvisory::offline(),
            (_, None) => WeatherAdvisory::scanning(),
            (status, Some(reading)) => WeatherAdvisory {
                status,
                ..WeatherAdvisory::from_reading(reading, combat)
            },
        }
    }
}

fn insight_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("message").and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
