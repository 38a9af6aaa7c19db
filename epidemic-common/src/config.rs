use crate::params::{EpidemicParameters, PopulationParameters, PreventativeMeasures};
use crate::series::SeriesMask;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Settings shared by every lane
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationSection {
    /// Ceiling on simulated individuals; larger populations are rescaled.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_start_infected")]
    pub start_infected: u32,
    /// Master seed. Seeded from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    pub total_steps: u32,
}

// One side-by-side simulation
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LaneConfig {
    pub name: String,
    #[serde(default)]
    pub location: Option<PopulationParameters>,
    #[serde(default)]
    pub disease: Option<EpidemicParameters>,
    #[serde(default)]
    pub measures: PreventativeMeasures,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PlaybackConfig {
    /// Delay between steps while playing.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Give every lane the same y-axis limit.
    #[serde(default = "default_shared_scale")]
    pub shared_scale: bool,
    #[serde(default)]
    pub visible: SeriesMask,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            interval_ms: default_interval_ms(),
            shared_scale: default_shared_scale(),
            visible: SeriesMask::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    #[serde(default)]
    pub save_csv: bool,
    pub format: Option<String>, // "json", "bincode", "messagepack"
}

fn default_capacity() -> u32 {
    50_000
}

fn default_start_infected() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    100
}

fn default_shared_scale() -> bool {
    true
}

/// Run configuration, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub simulation: SimulationSection,
    pub lanes: Vec<LaneConfig>,
    #[serde(default)]
    pub playback: PlaybackConfig,
    pub output: OutputConfig,
}

impl RunConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.simulation.capacity == 0 {
            anyhow::bail!("capacity must be greater than 0.");
        }
        if self.lanes.is_empty() {
            anyhow::bail!("at least one [[lanes]] entry is required.");
        }
        for lane in &self.lanes {
            if let Some(location) = &lane.location {
                location
                    .validate()
                    .map_err(|e| anyhow::anyhow!("lane '{}': {}", lane.name, e))?;
            }
            if let Some(disease) = &lane.disease {
                disease
                    .validate()
                    .map_err(|e| anyhow::anyhow!("lane '{}': {}", lane.name, e))?;
            }
            lane.measures
                .validate()
                .map_err(|e| anyhow::anyhow!("lane '{}': {}", lane.name, e))?;
        }
        Ok(())
    }
}
