pub mod config;
pub mod params;
pub mod series;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{LaneConfig, OutputConfig, PlaybackConfig, RunConfig, SimulationSection};
pub use params::{EpidemicParameters, ParameterError, PopulationParameters, PreventativeMeasures};
pub use series::{SeriesKind, SeriesMask, TimeSeries, TimestepCounts};
pub use snapshot::{LaneSnapshot, RunSnapshot};
