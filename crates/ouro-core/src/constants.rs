/// Backlog above this count is an emergency: the threat display saturates.
pub const BACKLOG_CRITICAL: u64 = 200;

/// Ceiling of the hostile/threat counter shown to the operator.
pub const THREAT_MAX: u64 = 50;

/// Backlog items per sector (one hex on the cortex map).
pub const SECTOR_CAPACITY: u64 = 50;

/// Cortex map grid: 8 columns × 4 rows.
pub const GRID_COLS: usize = 8;
pub const GRID_ROWS: usize = 4;

/// Total sectors visualized on the cortex map.
pub const TOTAL_SECTORS: usize = GRID_COLS * GRID_ROWS;

/// Pulse above this is critical (BPM).
pub const PULSE_CRITICAL_BPM: f64 = 110.0;

/// Pulse above this is a spike (BPM).
pub const PULSE_SPIKE_BPM: f64 = 90.0;

/// Resting pulse shown before any sample arrives (BPM).
pub const PULSE_DEFAULT_BPM: f64 = 65.0;

/// Condition codes at or above this are precipitation-class.
pub const PRECIPITATION_CODE: i64 = 60;

/// Condition codes that call for eye protection.
pub const GLARE_CODES: [i64; 2] = [51, 52];

/// Below this temperature (°C) heavy cold gear is advised.
pub const COLD_BELOW_C: f64 = 15.0;

/// Below this temperature (°C) a light layer is advised.
pub const COOL_BELOW_C: f64 = 20.0;

/// Above this temperature (°C) hydration/cooling is advised.
pub const HOT_ABOVE_C: f64 = 30.0;

/// Station used when no position is known.
pub const DEFAULT_STATION: &str = "HK Observatory";

/// Fallback reading when the provider lacks a station sample (°C).
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

/// Fallback condition code when the provider sends no icon.
pub const DEFAULT_CONDITION_CODE: i64 = 50;

/// Fallback relative humidity (%).
pub const DEFAULT_HUMIDITY: f64 = 75.0;

/// Bounded wait for a geoposition fix before using the default station.
pub const GEOPOSITION_TIMEOUT_MS: u64 = 5_000;

/// Free-text biometric values longer than this are cut at their first '('.
pub const BIO_VALUE_MAX_LEN: usize = 70;
