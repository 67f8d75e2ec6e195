//! Moon tracking engine
//!
//! Computes, once per tick, where the Moon is for the current observer:
//! position and horizontal coordinates, phase, the next moonrise and
//! moonset, and upcoming eclipses. Results are published as [`Snapshot`]s.
//! When the ephemeris provider is not available every dependent field is
//! reported as unavailable instead of being approximated.

pub mod engine;
pub mod ephemeris;
pub mod error;
pub mod events;
pub mod location;
pub mod phase;
pub mod position;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
pub mod utils;

// Re-export public API
pub use engine::Engine;
pub use ephemeris::{EphemerisProvider, ProviderHandle, SeriesEphemeris, SpkEphemeris};
pub use location::{LocationService, ObserverLocation};
pub use phase::{compute_phase, MoonPhase, PhaseName};
pub use position::{Availability, MoonPosition, Visibility};
pub use runtime::Runtime;
pub use snapshot::{JsonLinesSink, Snapshot, SnapshotSink};
pub use utils::config::EngineConfig;
