use crate::params::{EpidemicParameters, PopulationParameters, PreventativeMeasures};
use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};

/// Everything recorded for one lane at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneSnapshot {
    pub name: String,
    /// False when the lane was missing a location or disease and never advanced.
    pub runnable: bool,
    pub location: Option<PopulationParameters>,
    pub disease: Option<EpidemicParameters>,
    pub measures: PreventativeMeasures,
    /// Individuals actually simulated (population capped at capacity, rounded down per cell).
    pub total_individuals: u64,
    pub grid_width: usize,
    /// Timesteps computed, including the seed state.
    pub loaded_timesteps: usize,
    pub series: TimeSeries,
}

/// A whole run: all lanes plus the viewed timestep when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub viewed_timestep: usize,
    pub lanes: Vec<LaneSnapshot>,
}
