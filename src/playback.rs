use crate::simulation::SimulationEngine;
use epidemic_common::{
    EpidemicParameters, LaneSnapshot, ParameterError, PopulationParameters, PreventativeMeasures,
    SeriesMask, TimeSeries,
};

/// Figures shown for a single viewed timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestepSummary {
    pub new_cases: u64,
    pub current_infected: u64,
    /// Everyone infected so far, including the starting infections.
    pub all_time_cases: u64,
    pub recovered: u64,
    pub deaths: u64,
}

/// Separates how far a lane has been simulated from which timestep is being viewed.
///
/// History is only ever extended, one step at a time, when the view reaches
/// its end. Reads never touch the engine.
pub struct PlaybackBuffer {
    name: String,
    engine: SimulationEngine,
    loaded_timesteps: usize,
}

impl PlaybackBuffer {
    pub fn new(name: impl Into<String>, engine: SimulationEngine) -> Self {
        let loaded_timesteps = engine.series().len();
        Self {
            name: name.into(),
            engine,
            loaded_timesteps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Timesteps simulated so far, counting the seed state.
    pub fn loaded_timesteps(&self) -> usize {
        self.loaded_timesteps
    }

    pub fn is_runnable(&self) -> bool {
        self.engine.is_runnable()
    }

    /// Simulates one more step if `viewed` is at (or past) the end of computed history.
    /// Returns true when a step was computed.
    pub fn advance_if_needed(&mut self, viewed: usize) -> bool {
        if viewed + 1 < self.loaded_timesteps {
            return false;
        }
        if self.engine.next_timestep() {
            self.loaded_timesteps += 1;
            true
        } else {
            false
        }
    }

    /// Every series truncated to timesteps `0..=viewed`.
    pub fn read_series_up_to(&self, viewed: usize) -> TimeSeries {
        self.engine.series().prefix_through(viewed)
    }

    /// Largest visible value up to `viewed`, for shared axis scaling.
    pub fn max_visible_value(&self, mask: SeriesMask, viewed: usize) -> u64 {
        self.engine.series().max_through(mask, viewed)
    }

    pub fn summary_at(&self, timestep: usize) -> Option<TimestepSummary> {
        let series = self.engine.series();
        let counts = series.at(timestep)?;
        let cases_so_far: u64 = series.new_cases[..=timestep].iter().sum();
        Some(TimestepSummary {
            new_cases: counts.new_cases,
            current_infected: counts.infected,
            all_time_cases: cases_so_far + series.infected[0],
            recovered: counts.recovered,
            deaths: counts.dead,
        })
    }

    /// Discards history and reseeds the engine.
    pub fn reset(&mut self) {
        self.engine.reset_sim();
        self.loaded_timesteps = 1;
    }

    pub fn set_population(&mut self, population: PopulationParameters) -> Result<(), ParameterError> {
        self.engine.set_population(population)?;
        self.loaded_timesteps = 1;
        Ok(())
    }

    pub fn set_disease(&mut self, disease: EpidemicParameters) -> Result<(), ParameterError> {
        self.engine.set_disease(disease)?;
        self.loaded_timesteps = 1;
        Ok(())
    }

    pub fn set_start_infected(&mut self, start_infected: u32) {
        self.engine.set_start_infected(start_infected);
    }

    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), ParameterError> {
        self.engine.set_capacity(capacity)
    }

    pub fn set_vaccinated_fraction(&mut self, fraction: f64) -> Result<(), ParameterError> {
        self.engine.set_vaccinated_fraction(fraction)
    }

    pub fn set_quarantine(&mut self, enabled: bool, level: f64) -> Result<(), ParameterError> {
        self.engine.set_quarantine(enabled, level)
    }

    pub fn set_lockdown(&mut self, enabled: bool, intensity: f64) -> Result<(), ParameterError> {
        self.engine.set_lockdown(enabled, intensity)
    }

    pub fn set_measures(&mut self, measures: PreventativeMeasures) -> Result<(), ParameterError> {
        self.engine.set_measures(measures)
    }

    pub fn snapshot(&self) -> LaneSnapshot {
        LaneSnapshot {
            name: self.name.clone(),
            runnable: self.engine.is_runnable(),
            location: self.engine.population().cloned(),
            disease: self.engine.disease().cloned(),
            measures: self.engine.measures().clone(),
            total_individuals: self.engine.total_individuals(),
            grid_width: self.engine.grid_width(),
            loaded_timesteps: self.loaded_timesteps,
            series: self.engine.series().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::EngineOptions;
    use epidemic_common::SeriesKind;

    fn lane(seed: u64) -> PlaybackBuffer {
        let engine = SimulationEngine::with_parameters(
            PopulationParameters::new(10_000, 100.0).unwrap(),
            EpidemicParameters::new(2.8, 0.006, 5, 9).unwrap(),
            EngineOptions {
                seed: Some(seed),
                ..Default::default()
            },
        )
        .unwrap();
        PlaybackBuffer::new("lane", engine)
    }

    #[test]
    fn advances_only_at_the_frontier() {
        let mut buffer = lane(1);
        assert_eq!(buffer.loaded_timesteps(), 1);
        assert!(buffer.advance_if_needed(0));
        assert!(buffer.advance_if_needed(1));
        assert_eq!(buffer.loaded_timesteps(), 3);

        // Scrubbed back: history already covers the view.
        assert!(!buffer.advance_if_needed(0));
        assert!(!buffer.advance_if_needed(1));
        assert_eq!(buffer.loaded_timesteps(), 3);
        assert_eq!(buffer.engine().series().len(), 3);

        assert!(buffer.advance_if_needed(2));
        assert_eq!(buffer.loaded_timesteps(), 4);
    }

    #[test]
    fn reads_are_repeatable_and_bounded() {
        let mut buffer = lane(2);
        for viewed in 0..6 {
            buffer.advance_if_needed(viewed);
        }
        let first = buffer.read_series_up_to(3);
        let second = buffer.read_series_up_to(3);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(buffer.read_series_up_to(100).len(), buffer.loaded_timesteps());
        assert_eq!(buffer.loaded_timesteps(), 7);
    }

    #[test]
    fn idle_lane_never_loads() {
        let engine = SimulationEngine::new(EngineOptions::default()).unwrap();
        let mut buffer = PlaybackBuffer::new("empty", engine);
        assert!(!buffer.is_runnable());
        for viewed in 0..5 {
            assert!(!buffer.advance_if_needed(viewed));
        }
        assert_eq!(buffer.loaded_timesteps(), 1);
        assert_eq!(buffer.read_series_up_to(3).susceptible, vec![0]);
    }

    #[test]
    fn reset_and_reparameterise_restart_history() {
        let mut buffer = lane(3);
        for viewed in 0..4 {
            buffer.advance_if_needed(viewed);
        }
        buffer.reset();
        assert_eq!(buffer.loaded_timesteps(), 1);
        assert_eq!(buffer.engine().series().len(), 1);

        buffer.advance_if_needed(0);
        buffer
            .set_disease(EpidemicParameters::new(3.5, 0.01, 4, 7).unwrap())
            .unwrap();
        assert_eq!(buffer.loaded_timesteps(), 1);

        // Measures change the running lane without restarting it.
        buffer.advance_if_needed(0);
        buffer.set_vaccinated_fraction(0.4).unwrap();
        assert_eq!(buffer.loaded_timesteps(), 2);
    }

    #[test]
    fn summary_and_max_value() {
        let mut buffer = lane(4);
        for viewed in 0..10 {
            buffer.advance_if_needed(viewed);
        }
        let series = buffer.engine().series().clone();
        let summary = buffer.summary_at(5).unwrap();
        assert_eq!(summary.current_infected, series.infected[5]);
        assert_eq!(
            summary.all_time_cases,
            series.new_cases[..=5].iter().sum::<u64>() + 10
        );
        assert!(buffer.summary_at(50).is_none());

        let infected = SeriesMask::only(&[SeriesKind::Infected]);
        assert_eq!(
            buffer.max_visible_value(infected, 5),
            *series.infected[..=5].iter().max().unwrap()
        );
        assert_eq!(buffer.max_visible_value(SeriesMask::ALL, 0), 9_990);
    }
}
