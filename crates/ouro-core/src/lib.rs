//! Ouroboros telemetry fusion core.
//!
//! Folds sparse, out-of-order telemetry (calendar, spaced-repetition backlog,
//! biometric advisories, weather, operator signals) into one operating mode
//! and a handful of derived views: bio metrics, sector occupancy, weather
//! advisories and the threat counter.
//!
//! Zero I/O. Transport and presentation live in the link and cli crates.

pub mod advisory;
pub mod bio;
pub mod constants;
pub mod event;
pub mod fusion;
pub mod governor;
pub mod mission;
pub mod pulse;
pub mod sector;
pub mod station;
pub mod time;

pub use advisory::{
    ConditionClass, WeatherAdvisory, WeatherReading, WeatherStatus, advise, condition_class,
};
pub use bio::{BioCategory, BioMetric, BioPayload};
pub use event::{Source, TelemetryEvent, value_as_count, value_as_f64};
pub use fusion::{
    Feed, FeedStatus, FusionService, GridConfig, IngestOutcome, LinkHealth, ReadModel,
};
pub use governor::{
    GovernorSignal, ModeGovernor, ModeOrigin, SignalColor, SystemMode, ThreatCount, ThreatStatus,
    assess_threat,
};
pub use mission::{CalendarEntry, Mission, MissionStatus};
pub use pulse::{PulseReading, PulseStatus};
pub use sector::{SectorOccupancy, SectorState, default_occupancy, occupancy};
pub use station::{STATIONS, Station, default_stations, nearest};
