use crate::playback::{PlaybackBuffer, TimestepSummary};
use crate::simulation::{EngineOptions, SimulationEngine};
use anyhow::{anyhow, Result};
use epidemic_common::{
    EpidemicParameters, ParameterError, PopulationParameters, PreventativeMeasures, RunConfig,
    RunSnapshot, SeriesMask, TimeSeries,
};
use log::{debug, info};
use rayon::prelude::*;

/// Smallest y-axis limit handed out.
pub const MIN_AXIS_LIMIT: u64 = 50;

/// Y-axis limit leaving a tenth of headroom above `max`.
pub fn axis_limit(max: u64) -> u64 {
    if max < 46 {
        MIN_AXIS_LIMIT
    } else {
        (max as f64 * 1.1) as u64
    }
}

/// Where playback stands: the viewed timestep and how much history exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub viewed: usize,
    pub loaded: usize,
}

/// Side-by-side lanes sharing one viewed timestep.
pub struct Session {
    lanes: Vec<PlaybackBuffer>,
    viewed: usize,
}

impl Session {
    pub fn new(lanes: Vec<PlaybackBuffer>) -> Self {
        Self { lanes, viewed: 0 }
    }

    /// One lane per `[[lanes]]` entry. Lanes missing a location or disease stay idle.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let mut lanes = Vec::with_capacity(config.lanes.len());
        for (idx, lane_config) in config.lanes.iter().enumerate() {
            let options = EngineOptions {
                capacity: config.simulation.capacity,
                start_infected: config.simulation.start_infected,
                // Distinct but reproducible stream per lane.
                seed: config.simulation.seed.map(|seed| seed.wrapping_add(idx as u64)),
            };
            let mut engine = SimulationEngine::new(options)?;
            engine.set_measures(lane_config.measures.clone())?;
            if let Some(location) = &lane_config.location {
                engine.set_population(location.clone())?;
            }
            if let Some(disease) = &lane_config.disease {
                engine.set_disease(disease.clone())?;
            }
            if engine.is_runnable() {
                info!(
                    "Lane '{}': {} individuals on a {}x{} grid.",
                    lane_config.name,
                    engine.total_individuals(),
                    engine.grid_width(),
                    engine.grid_width()
                );
            } else {
                info!("Lane '{}' is missing a location or disease and will stay idle.", lane_config.name);
            }
            lanes.push(PlaybackBuffer::new(lane_config.name.clone(), engine));
        }
        Ok(Self::new(lanes))
    }

    pub fn lanes(&self) -> &[PlaybackBuffer] {
        &self.lanes
    }

    pub fn lane(&self, idx: usize) -> Option<&PlaybackBuffer> {
        self.lanes.get(idx)
    }

    fn lane_for_update(&mut self, idx: usize) -> Result<&mut PlaybackBuffer> {
        let count = self.lanes.len();
        self.lanes
            .get_mut(idx)
            .ok_or_else(|| anyhow!("No lane {} in a session of {}", idx, count))
    }

    /// Gives one lane a new location. Every lane restarts from timestep 0 so
    /// they stay in lockstep.
    pub fn set_population(&mut self, idx: usize, population: PopulationParameters) -> Result<()> {
        self.lane_for_update(idx)?.set_population(population)?;
        self.reset();
        Ok(())
    }

    /// Gives one lane a new disease. Every lane restarts from timestep 0.
    pub fn set_disease(&mut self, idx: usize, disease: EpidemicParameters) -> Result<()> {
        self.lane_for_update(idx)?.set_disease(disease)?;
        self.reset();
        Ok(())
    }

    /// Changes one lane's measures in place; history is kept.
    pub fn set_lane_measures(&mut self, idx: usize, measures: PreventativeMeasures) -> Result<()> {
        self.lane_for_update(idx)?.set_measures(measures)?;
        Ok(())
    }

    pub fn viewed(&self) -> usize {
        self.viewed
    }

    /// Computed history of the first lane. Lanes advance in lockstep.
    pub fn loaded_timesteps(&self) -> usize {
        self.lanes
            .first()
            .map_or(1, PlaybackBuffer::loaded_timesteps)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            viewed: self.viewed,
            loaded: self.loaded_timesteps(),
        }
    }

    /// Playable only when every lane has both a location and a disease.
    pub fn is_runnable(&self) -> bool {
        !self.lanes.is_empty() && self.lanes.iter().all(PlaybackBuffer::is_runnable)
    }

    /// Moves the view forward one timestep, simulating it first where needed.
    /// Lanes advance in parallel. Does nothing unless the session is runnable.
    pub fn step_forward(&mut self) -> bool {
        if !self.is_runnable() {
            return false;
        }
        let viewed = self.viewed;
        let computed = self
            .lanes
            .par_iter_mut()
            .map(|lane| lane.advance_if_needed(viewed))
            .filter(|&stepped| stepped)
            .count();
        self.viewed += 1;
        debug!("Viewing timestep {} ({} lane(s) computed a new step).", self.viewed, computed);
        true
    }

    pub fn step_back(&mut self) {
        self.viewed = self.viewed.saturating_sub(1);
    }

    pub fn first(&mut self) {
        self.viewed = 0;
    }

    /// Jumps to the newest computed timestep.
    pub fn last(&mut self) {
        self.viewed = self.loaded_timesteps() - 1;
    }

    pub fn reset(&mut self) {
        self.lanes.iter_mut().for_each(PlaybackBuffer::reset);
        self.viewed = 0;
    }

    /// Applies the same measures to every lane. Validated once, up front.
    pub fn set_measures(&mut self, measures: &PreventativeMeasures) -> Result<(), ParameterError> {
        measures.validate()?;
        for lane in &mut self.lanes {
            lane.set_measures(measures.clone())?;
        }
        Ok(())
    }

    pub fn set_start_infected(&mut self, start_infected: u32) {
        for lane in &mut self.lanes {
            lane.set_start_infected(start_infected);
        }
    }

    /// Each lane's series up to the viewed timestep.
    pub fn read_series(&self) -> Vec<TimeSeries> {
        self.lanes
            .iter()
            .map(|lane| lane.read_series_up_to(self.viewed))
            .collect()
    }

    pub fn summaries(&self) -> Vec<Option<TimestepSummary>> {
        self.lanes.iter().map(|lane| lane.summary_at(self.viewed)).collect()
    }

    /// Y-axis limit per lane. With `shared`, every lane gets the largest one.
    pub fn axis_limits(&self, mask: SeriesMask, shared: bool) -> Vec<u64> {
        let limits: Vec<u64> = self
            .lanes
            .iter()
            .map(|lane| axis_limit(lane.max_visible_value(mask, self.viewed)))
            .collect();
        if shared {
            let top = limits.iter().copied().max().unwrap_or(MIN_AXIS_LIMIT);
            vec![top; limits.len()]
        } else {
            limits
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            viewed_timestep: self.viewed,
            lanes: self.lanes.iter().map(PlaybackBuffer::snapshot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidemic_common::SeriesKind;

    fn lane(name: &str, r0: f64, seed: u64) -> PlaybackBuffer {
        let engine = SimulationEngine::with_parameters(
            PopulationParameters::new(10_000, 100.0).unwrap(),
            EpidemicParameters::new(r0, 0.006, 5, 9).unwrap(),
            EngineOptions {
                seed: Some(seed),
                ..Default::default()
            },
        )
        .unwrap();
        PlaybackBuffer::new(name, engine)
    }

    fn pair() -> Session {
        Session::new(vec![lane("low", 1.5, 1), lane("high", 8.0, 2)])
    }

    #[test]
    fn axis_limit_has_floor_and_headroom() {
        assert_eq!(axis_limit(0), 50);
        assert_eq!(axis_limit(45), 50);
        assert_eq!(axis_limit(46), 50);
        assert_eq!(axis_limit(100), 110);
        assert_eq!(axis_limit(1_000), 1_100);
    }

    #[test]
    fn navigation_keeps_history() {
        let mut session = pair();
        for _ in 0..5 {
            assert!(session.step_forward());
        }
        assert_eq!(session.progress(), Progress { viewed: 5, loaded: 6 });

        session.step_back();
        session.step_back();
        assert_eq!(session.viewed(), 3);
        // Re-walking computed history does not simulate anything new.
        session.step_forward();
        assert_eq!(session.progress(), Progress { viewed: 4, loaded: 6 });

        session.first();
        session.step_back();
        assert_eq!(session.viewed(), 0);

        session.last();
        assert_eq!(session.viewed(), 5);
        assert!(session.lanes().iter().all(|lane| lane.loaded_timesteps() == 6));
    }

    #[test]
    fn idle_lane_blocks_stepping() {
        let idle = PlaybackBuffer::new(
            "idle",
            SimulationEngine::new(EngineOptions::default()).unwrap(),
        );
        let mut session = Session::new(vec![lane("ok", 2.8, 1), idle]);
        assert!(!session.is_runnable());
        assert!(!session.step_forward());
        assert_eq!(session.progress(), Progress { viewed: 0, loaded: 1 });
    }

    #[test]
    fn shared_axis_uses_largest_lane() {
        let mut session = pair();
        for _ in 0..8 {
            session.step_forward();
        }
        let mask = SeriesMask::only(&[SeriesKind::Susceptible]);
        let independent = session.axis_limits(mask, false);
        let shared = session.axis_limits(mask, true);
        assert_eq!(independent.len(), 2);
        let top = *independent.iter().max().unwrap();
        assert_eq!(shared, vec![top, top]);
        assert_eq!(top, axis_limit(9_990));
    }

    #[test]
    fn reset_returns_to_seed_state() {
        let mut session = pair();
        for _ in 0..4 {
            session.step_forward();
        }
        session.reset();
        assert_eq!(session.progress(), Progress { viewed: 0, loaded: 1 });
        assert!(session.read_series().iter().all(|series| series.len() == 1));
    }

    #[test]
    fn reparameterising_a_lane_restarts_the_session() {
        let mut session = pair();
        for _ in 0..10 {
            session.step_forward();
        }
        session
            .set_disease(0, EpidemicParameters::new(3.5, 0.01, 4, 7).unwrap())
            .unwrap();
        assert_eq!(session.progress(), Progress { viewed: 0, loaded: 1 });
        assert!(session.lanes().iter().all(|lane| lane.loaded_timesteps() == 1));

        session.step_forward();
        let loaded: Vec<usize> = session.lanes().iter().map(PlaybackBuffer::loaded_timesteps).collect();
        assert_eq!(loaded, vec![2, 2]);
        assert!(session.summaries().iter().all(Option::is_some));
        assert!(session.read_series().iter().all(|series| series.len() == 2));

        session
            .set_population(1, PopulationParameters::new(4_000, 25.0).unwrap())
            .unwrap();
        assert_eq!(session.progress(), Progress { viewed: 0, loaded: 1 });
        assert_eq!(session.lane(1).unwrap().engine().total_individuals(), 4_000);
    }

    #[test]
    fn lane_updates_are_checked() {
        let mut session = pair();
        session.step_forward();
        assert!(session
            .set_disease(5, EpidemicParameters::new(3.5, 0.01, 4, 7).unwrap())
            .is_err());

        let mut bad = EpidemicParameters::new(3.5, 0.01, 4, 7).unwrap();
        bad.r0 = 0.0;
        assert!(session.set_disease(0, bad).is_err());
        // Rejected updates leave the view and history alone.
        assert_eq!(session.progress(), Progress { viewed: 1, loaded: 2 });

        let measures = PreventativeMeasures {
            vaccinated_fraction: 0.25,
            ..Default::default()
        };
        session.set_lane_measures(1, measures.clone()).unwrap();
        assert_eq!(session.lane(1).unwrap().engine().measures(), &measures);
        assert_eq!(session.lane(0).unwrap().engine().measures(), &PreventativeMeasures::default());
        assert_eq!(session.progress(), Progress { viewed: 1, loaded: 2 });
    }

    #[test]
    fn measures_apply_to_every_lane() {
        let mut session = pair();
        let measures = PreventativeMeasures {
            vaccinated_fraction: 0.5,
            quarantine_enabled: true,
            ..Default::default()
        };
        session.set_measures(&measures).unwrap();
        assert!(session
            .lanes()
            .iter()
            .all(|lane| lane.engine().measures() == &measures));

        let invalid = PreventativeMeasures {
            quarantine_level: 3.0,
            ..Default::default()
        };
        assert!(session.set_measures(&invalid).is_err());
        assert!(session
            .lanes()
            .iter()
            .all(|lane| lane.engine().measures() == &measures));
    }
}
