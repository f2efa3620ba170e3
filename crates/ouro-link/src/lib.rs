//! Feed adapters for the fusion core: configuration, wire decoding, and the
//! HTTP clients that deliver telemetry (bulk snapshot, SSE push, weather,
//! position). Failures surface as [`LinkError`]; degrading to defaults is
//! left to the caller.

pub mod config;
pub mod error;
pub mod geo;
pub mod snapshot;
pub mod stream;
pub mod weather;
pub mod wire;

pub use config::{FixedPosition, LinkConfig, data_dir};
pub use error::{LinkError, Result};
pub use geo::GeoLocator;
pub use snapshot::{SnapshotClient, parse_snapshot};
pub use stream::{Backoff, PushSubscription, StreamUpdate};
pub use weather::{WeatherClient, resolve_reading};
pub use wire::{MissingStamp, decode, decode_str};
