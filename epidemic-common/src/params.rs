use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected input at a parameter setter. Nothing is mutated when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("population must be positive, got {0}")]
    NonPositivePopulation(u64),

    #[error("area must be a positive finite number, got {0}")]
    InvalidArea(f64),

    #[error("R0 must be a positive finite number, got {0}")]
    InvalidR0(f64),

    #[error("infectious period must be at least one day, got {0}")]
    NonPositiveInfectiousPeriod(u32),

    #[error("{name} must be a probability in [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("quarantine level must be above 0 while quarantine is enabled")]
    ZeroQuarantineLevel,

    #[error("simulation capacity must be positive")]
    ZeroCapacity,
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParameterError::ProbabilityOutOfRange { name, value })
    }
}

/// Disease descriptor. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpidemicParameters {
    #[serde(default)]
    pub name: String,
    /// Basic reproduction number.
    pub r0: f64,
    /// Probability that a resolved infection ends in death.
    pub mortality_rate: f64,
    /// Days an infected individual stays asymptomatic.
    pub incubation_period: u32,
    /// Mean infection length in days.
    pub infectious_period: u32,
}

impl EpidemicParameters {
    pub fn new(
        r0: f64,
        mortality_rate: f64,
        incubation_period: u32,
        infectious_period: u32,
    ) -> Result<Self, ParameterError> {
        let params = Self {
            name: String::new(),
            r0,
            mortality_rate,
            incubation_period,
            infectious_period,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(self.r0.is_finite() && self.r0 > 0.0) {
            return Err(ParameterError::InvalidR0(self.r0));
        }
        check_probability("mortality rate", self.mortality_rate)?;
        if self.infectious_period == 0 {
            return Err(ParameterError::NonPositiveInfectiousPeriod(self.infectious_period));
        }
        Ok(())
    }
}

/// Location descriptor: how many people live on how much land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParameters {
    #[serde(default)]
    pub name: String,
    pub population: u64,
    /// Land area in km^2.
    pub area: f64,
}

impl PopulationParameters {
    pub fn new(population: u64, area: f64) -> Result<Self, ParameterError> {
        let params = Self {
            name: String::new(),
            population,
            area,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.population == 0 {
            return Err(ParameterError::NonPositivePopulation(self.population));
        }
        if !(self.area.is_finite() && self.area > 0.0) {
            return Err(ParameterError::InvalidArea(self.area));
        }
        Ok(())
    }

    /// People per km^2.
    pub fn density(&self) -> f64 {
        self.population as f64 / self.area
    }
}

/// Caller-controlled interventions. These mutate a running simulation in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreventativeMeasures {
    pub vaccinated_fraction: f64,
    pub quarantine_enabled: bool,
    /// Chance per step that a detected infected individual is isolated.
    pub quarantine_level: f64,
    pub lockdown_enabled: bool,
    /// Infected fraction that triggers a lockdown; also scales movement while locked down.
    pub lockdown_intensity: f64,
}

impl Default for PreventativeMeasures {
    fn default() -> Self {
        Self {
            vaccinated_fraction: 0.0,
            quarantine_enabled: false,
            quarantine_level: 0.5,
            lockdown_enabled: false,
            lockdown_intensity: 0.1,
        }
    }
}

impl PreventativeMeasures {
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_probability("vaccinated fraction", self.vaccinated_fraction)?;
        Self::check_quarantine(self.quarantine_enabled, self.quarantine_level)?;
        check_probability("lockdown intensity", self.lockdown_intensity)?;
        Ok(())
    }

    pub fn check_vaccinated_fraction(fraction: f64) -> Result<(), ParameterError> {
        check_probability("vaccinated fraction", fraction)
    }

    /// Symptomatic movement is divided by the level, so an enabled quarantine needs a non-zero one.
    pub fn check_quarantine(enabled: bool, level: f64) -> Result<(), ParameterError> {
        check_probability("quarantine level", level)?;
        if enabled && level == 0.0 {
            return Err(ParameterError::ZeroQuarantineLevel);
        }
        Ok(())
    }

    pub fn check_lockdown_intensity(intensity: f64) -> Result<(), ParameterError> {
        check_probability("lockdown intensity", intensity)
    }

    /// Quarantine level when quarantine is switched on.
    pub fn quarantine(&self) -> Option<f64> {
        self.quarantine_enabled.then_some(self.quarantine_level)
    }
}
