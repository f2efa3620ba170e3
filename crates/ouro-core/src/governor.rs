//! Mode governor: the single owner of [`SystemMode`].
//!
//! Mode changes only through explicit governor signals (a color or a numeric
//! code) or a manual operator override. Backlog pressure is assessed in
//! parallel by [`assess_threat`] and escalates the threat *display* only; it
//! never moves the mode.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{BACKLOG_CRITICAL, THREAT_MAX};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    #[default]
    Normal,
    Warning,
    WarTime,
    Recovery,
}

impl SystemMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemMode::Normal => "NORMAL",
            SystemMode::Warning => "WARNING",
            SystemMode::WarTime => "WAR_TIME",
            SystemMode::Recovery => "RECOVERY",
        }
    }

    /// Combat wording is used for advisories while at war.
    pub fn is_combat(self) -> bool {
        self == SystemMode::WarTime
    }
}

impl fmt::Display for SystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalColor {
    Red,
    Yellow,
    Blue,
    Green,
}

impl SignalColor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Some(SignalColor::Red),
            "YELLOW" => Some(SignalColor::Yellow),
            "BLUE" => Some(SignalColor::Blue),
            "GREEN" => Some(SignalColor::Green),
            _ => None,
        }
    }

    pub fn mode(self) -> SystemMode {
        match self {
            SignalColor::Red => SystemMode::WarTime,
            SignalColor::Yellow => SystemMode::Warning,
            SignalColor::Blue => SystemMode::Recovery,
            SignalColor::Green => SystemMode::Normal,
        }
    }
}

/// Explicit mode directive carried by an operator-signal event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorSignal {
    Color(SignalColor),
    Code(i64),
    /// A payload that named no recognizable color or code.
    Unrecognized,
}

/// A float code counts only when it is a whole number; `1.9` is not `1`.
fn whole_code(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

impl GovernorSignal {
    /// Read a signal from an operator payload.
    ///
    /// A color outranks a code carried in the same payload. The legacy
    /// `Combat_Mode_Trigger` metric is read as RED.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => SignalColor::parse(s)
                .map(GovernorSignal::Color)
                .or_else(|| s.trim().parse::<i64>().ok().map(GovernorSignal::Code))
                .unwrap_or(GovernorSignal::Unrecognized),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_code))
                .map(GovernorSignal::Code)
                .unwrap_or(GovernorSignal::Unrecognized),
            Value::Object(map) => {
                if let Some(color) = map
                    .get("color")
                    .and_then(Value::as_str)
                    .and_then(SignalColor::parse)
                {
                    return GovernorSignal::Color(color);
                }
                if let Some(code) = map.get("code") {
                    return match Self::from_value(code) {
                        GovernorSignal::Color(_) => GovernorSignal::Unrecognized,
                        other => other,
                    };
                }
                let metric = map
                    .get("metric_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if metric.eq_ignore_ascii_case("Combat_Mode_Trigger") {
                    return GovernorSignal::Color(SignalColor::Red);
                }
                GovernorSignal::Unrecognized
            }
            _ => GovernorSignal::Unrecognized,
        }
    }

    /// The mode this signal governs to. Unknown values default to NORMAL.
    pub fn mode(&self) -> SystemMode {
        match self {
            GovernorSignal::Color(color) => color.mode(),
            GovernorSignal::Code(1) => SystemMode::WarTime,
            GovernorSignal::Code(3) => SystemMode::Warning,
            GovernorSignal::Code(4) => SystemMode::Recovery,
            GovernorSignal::Code(_) | GovernorSignal::Unrecognized => SystemMode::Normal,
        }
    }
}

/// Where the current mode came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeOrigin {
    /// Nothing has been received yet.
    Initial,
    /// Set by the latest accepted governor signal.
    Governed,
    /// Set by the operator; holds until the next real signal.
    Manual,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeGovernor {
    mode: SystemMode,
    origin: ModeOrigin,
    /// The mode the last real signal governed to, kept under a manual override.
    governed: SystemMode,
}

impl Default for ModeGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeGovernor {
    pub fn new() -> Self {
        Self {
            mode: SystemMode::Normal,
            origin: ModeOrigin::Initial,
            governed: SystemMode::Normal,
        }
    }

    pub fn mode(&self) -> SystemMode {
        self.mode
    }

    pub fn origin(&self) -> ModeOrigin {
        self.origin
    }

    /// Mode the last real signal asked for, regardless of manual override.
    pub fn governed_mode(&self) -> SystemMode {
        self.governed
    }

    /// Fold an accepted governor signal. A real signal always clears a
    /// manual override.
    pub fn fold(&mut self, signal: &GovernorSignal) -> SystemMode {
        self.governed = signal.mode();
        self.mode = self.governed;
        self.origin = ModeOrigin::Governed;
        self.mode
    }

    /// Manual override with an explicit color.
    pub fn override_with(&mut self, color: SignalColor) -> SystemMode {
        self.mode = color.mode();
        self.origin = ModeOrigin::Manual;
        self.mode
    }

    /// Manual toggle: GREEN out of WAR_TIME, RED from anything else.
    pub fn toggle(&mut self) -> SystemMode {
        let color = if self.mode == SystemMode::WarTime {
            SignalColor::Green
        } else {
            SignalColor::Red
        };
        self.override_with(color)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatStatus {
    Scanning,
    Engaged,
    Overrun,
}

/// Hostile counter derived from the backlog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatCount {
    pub count: u64,
    pub max: u64,
    pub status: ThreatStatus,
}

impl ThreatCount {
    pub fn scanning() -> Self {
        Self {
            count: 0,
            max: THREAT_MAX,
            status: ThreatStatus::Scanning,
        }
    }
}

/// Backlog → threat display. Above the critical threshold the count pins at
/// its maximum and reads OVERRUN.
pub fn assess_threat(backlog: Option<u64>) -> ThreatCount {
    match backlog {
        None => ThreatCount::scanning(),
        Some(b) if b > BACKLOG_CRITICAL => ThreatCount {
            count: THREAT_MAX,
            max: THREAT_MAX,
            status: ThreatStatus::Overrun,
        },
        Some(b) => ThreatCount {
            count: b.min(THREAT_MAX),
            max: THREAT_MAX,
            status: ThreatStatus::Engaged,
        },
    }
}
