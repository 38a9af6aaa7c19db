use crate::grid::{new_location, Cell, Grid};
use crate::individual::{Bin, Individual};
use crate::lockdown::LockdownTransition;
use crate::recovery::RecoveryModel;
use crate::sim_state::{GridLayout, SimulationState};
use epidemic_common::{
    EpidemicParameters, ParameterError, PopulationParameters, PreventativeMeasures, TimeSeries,
    TimestepCounts,
};
use log::{debug, info, trace};
use rand::prelude::*;
use rayon::prelude::*;
use std::time::Instant;

/// Per-contact infection chance for R0 = 1 with a single infected cell-mate.
pub const BASE_INFECTION_CHANCE: f64 = 0.00004;
/// Infection chance is divided by this while a lockdown is in force.
pub const LOCKDOWN_INFECTION_DIVISOR: f64 = 10.0;
pub const BASE_MOVE_CHANCE: f64 = 0.8;
/// Movement scaling for symptomatic individuals when quarantine is off.
pub const SYMPTOMATIC_MOVE_FACTOR: f64 = 0.75;
pub const DEFAULT_CAPACITY: u32 = 50_000;
pub const DEFAULT_START_INFECTED: u32 = 10;

/// Settings read at (re)initialisation rather than every step.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub capacity: u32,
    pub start_infected: u32,
    /// Master seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            start_infected: DEFAULT_START_INFECTED,
            seed: None,
        }
    }
}

/// Constants for one step, shared read-only by every cell.
struct StepContext<'a> {
    /// The timestep being computed.
    step: u32,
    infection_chance: f64,
    quarantine: Option<f64>,
    mortality_chance: f64,
    recovery: &'a RecoveryModel,
    incubation_period: u32,
    move_chance: f64,
}

impl StepContext<'_> {
    fn infected_move_chance(&self, individual: &Individual) -> f64 {
        if individual.infection_age(self.step) > self.incubation_period {
            match self.quarantine {
                Some(level) => self.move_chance / (10.0 * level),
                None => self.move_chance * SYMPTOMATIC_MOVE_FACTOR,
            }
        } else {
            // Still incubating: undetected, moves like anyone else.
            self.move_chance
        }
    }
}

/// Per-contact infection chance and base move chance for one step.
fn step_chances(r0: f64, measures: &PreventativeMeasures, lockdown_active: bool) -> (f64, f64) {
    let vaccinated = measures.vaccinated_fraction;
    let mut infection_chance = BASE_INFECTION_CHANCE * r0 * (1.0 - vaccinated * vaccinated);
    let mut move_chance = BASE_MOVE_CHANCE;
    if lockdown_active {
        infection_chance /= LOCKDOWN_INFECTION_DIVISOR;
        move_chance *= measures.lockdown_intensity;
    }
    (infection_chance, move_chance)
}

/// Independent stream for one cell within one pass.
#[inline(always)]
fn cell_rng(pass_seed: u64, cell_idx: usize) -> StdRng {
    let mixed = pass_seed ^ (cell_idx as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    StdRng::seed_from_u64(mixed)
}

/// Bin an infected individual belongs in after this step's recovery draw.
fn resolve_infection<R: Rng + ?Sized>(individual: &Individual, ctx: &StepContext, rng: &mut R) -> Bin {
    if let Some(level) = ctx.quarantine {
        if rng.random::<f64>() < level {
            // Isolated individuals leave the infected pool through the recovered bin.
            return Bin::Recovered;
        }
    }
    let chance = ctx.recovery.chance_for_age(individual.infection_age(ctx.step));
    if rng.random::<f64>() < chance {
        if rng.random::<f64>() < ctx.mortality_chance {
            Bin::Dead
        } else {
            Bin::Recovered
        }
    } else {
        Bin::Infected
    }
}

/// Infection then recovery for one cell, both against the cell's pre-step bins.
/// Returns the number of new cases.
fn infect_and_resolve<R: Rng + ?Sized>(cell: &mut Cell, ctx: &StepContext, rng: &mut R) -> u64 {
    let previously_infected = cell.take(Bin::Infected);
    let mut new_cases = 0;

    if !previously_infected.is_empty() {
        // Not capped at 1: crowded cells infect every susceptible.
        let threshold = ctx.infection_chance * previously_infected.len() as f64;
        for mut individual in cell.take(Bin::Susceptible) {
            if rng.random::<f64>() < threshold {
                individual.infect(ctx.step);
                cell.push(Bin::Infected, individual);
                new_cases += 1;
            } else {
                cell.push(Bin::Susceptible, individual);
            }
        }
    }

    for individual in previously_infected {
        let bin = resolve_infection(&individual, ctx, rng);
        cell.push(bin, individual);
    }

    new_cases
}

/// Relocates susceptible and infected individuals. Recovered and dead stay put.
///
/// Destinations are drawn in parallel from the pre-move grid, then written
/// serially, so nobody moves twice and the result is the same as filling a
/// fresh grid.
fn move_individuals(grid: &mut Grid, ctx: &StepContext, move_seed: u64) {
    let width = grid.width();

    let movers: Vec<Vec<(usize, Bin, Individual)>> = grid
        .cells_mut()
        .par_iter_mut()
        .enumerate()
        .map(|(idx, cell)| {
            let mut rng = cell_rng(move_seed, idx);
            let (row, col) = (idx / width, idx % width);
            let mut out = Vec::with_capacity(cell.count(Bin::Susceptible) + cell.count(Bin::Infected));

            for individual in cell.take(Bin::Susceptible) {
                let (r, c) = new_location(row, col, width, ctx.move_chance, &mut rng);
                out.push((r * width + c, Bin::Susceptible, individual));
            }
            for individual in cell.take(Bin::Infected) {
                let chance = ctx.infected_move_chance(&individual);
                let (r, c) = new_location(row, col, width, chance, &mut rng);
                out.push((r * width + c, Bin::Infected, individual));
            }
            out
        })
        .collect();

    let cells = grid.cells_mut();
    for (dest, bin, individual) in movers.into_iter().flatten() {
        cells[dest].push(bin, individual);
    }
}

/// Stochastic grid epidemic: one lane of a comparison.
pub struct SimulationEngine {
    population: Option<PopulationParameters>,
    disease: Option<EpidemicParameters>,
    /// Rebuilt whenever the disease changes.
    recovery: Option<RecoveryModel>,
    capacity: u32,
    start_infected: u32,
    state: SimulationState,
    /// Master RNG: seeds the grid and hands out per-pass seeds.
    rng: StdRng,
}

impl SimulationEngine {
    /// Creates an idle engine; it becomes runnable once a location and a disease are set.
    pub fn new(options: EngineOptions) -> Result<Self, ParameterError> {
        if options.capacity == 0 {
            return Err(ParameterError::ZeroCapacity);
        }
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            population: None,
            disease: None,
            recovery: None,
            capacity: options.capacity,
            start_infected: options.start_infected,
            state: SimulationState::empty(PreventativeMeasures::default()),
            rng,
        })
    }

    /// Creates an engine bound to a location and disease, initialised and ready to step.
    pub fn with_parameters(
        population: PopulationParameters,
        disease: EpidemicParameters,
        options: EngineOptions,
    ) -> Result<Self, ParameterError> {
        population.validate()?;
        disease.validate()?;
        let mut engine = Self::new(options)?;
        engine.recovery = Some(RecoveryModel::new(disease.infectious_period));
        engine.population = Some(population);
        engine.disease = Some(disease);
        engine.reset_sim();
        Ok(engine)
    }

    /// Replaces the location and starts a fresh run.
    pub fn set_population(&mut self, population: PopulationParameters) -> Result<(), ParameterError> {
        population.validate()?;
        info!(
            "Location set to '{}' (population {}, area {}).",
            population.name, population.population, population.area
        );
        self.population = Some(population);
        self.reset_sim();
        Ok(())
    }

    /// Replaces the disease, rebuilds the recovery table and starts a fresh run.
    pub fn set_disease(&mut self, disease: EpidemicParameters) -> Result<(), ParameterError> {
        disease.validate()?;
        info!(
            "Disease set to '{}' (R0 {}, mortality {}, incubation {}d, infectious {}d).",
            disease.name, disease.r0, disease.mortality_rate, disease.incubation_period, disease.infectious_period
        );
        self.recovery = Some(RecoveryModel::new(disease.infectious_period));
        self.disease = Some(disease);
        self.reset_sim();
        Ok(())
    }

    /// Takes effect at the next reset.
    pub fn set_start_infected(&mut self, start_infected: u32) {
        self.start_infected = start_infected;
    }

    /// Takes effect at the next reset.
    pub fn set_capacity(&mut self, capacity: u32) -> Result<(), ParameterError> {
        if capacity == 0 {
            return Err(ParameterError::ZeroCapacity);
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn set_vaccinated_fraction(&mut self, fraction: f64) -> Result<(), ParameterError> {
        PreventativeMeasures::check_vaccinated_fraction(fraction)?;
        self.state.measures.vaccinated_fraction = fraction;
        Ok(())
    }

    pub fn set_quarantine(&mut self, enabled: bool, level: f64) -> Result<(), ParameterError> {
        PreventativeMeasures::check_quarantine(enabled, level)?;
        self.state.measures.quarantine_enabled = enabled;
        self.state.measures.quarantine_level = level;
        Ok(())
    }

    /// Switching lockdowns off also lifts one currently in force.
    pub fn set_lockdown(&mut self, enabled: bool, intensity: f64) -> Result<(), ParameterError> {
        PreventativeMeasures::check_lockdown_intensity(intensity)?;
        self.state.measures.lockdown_enabled = enabled;
        self.state.measures.lockdown_intensity = intensity;
        if !enabled && self.state.lockdown.is_active() {
            info!("Lockdown disabled at timestep {}; lifting active lockdown.", self.state.timestep);
            self.state.lockdown.clear();
        }
        Ok(())
    }

    /// Applies every measure at once; nothing changes if any value is invalid.
    pub fn set_measures(&mut self, measures: PreventativeMeasures) -> Result<(), ParameterError> {
        measures.validate()?;
        self.state.measures.vaccinated_fraction = measures.vaccinated_fraction;
        self.state.measures.quarantine_enabled = measures.quarantine_enabled;
        self.state.measures.quarantine_level = measures.quarantine_level;
        self.set_lockdown(measures.lockdown_enabled, measures.lockdown_intensity)
    }

    /// True once both a location and a disease are set.
    pub fn is_runnable(&self) -> bool {
        self.population.is_some() && self.disease.is_some()
    }

    /// Re-initialises from the current parameters with a fresh random seeding.
    /// Preventative measures carry over.
    pub fn reset_sim(&mut self) {
        let measures = self.state.measures.clone();
        self.state = match &self.population {
            Some(population) if self.disease.is_some() => {
                let layout = GridLayout::for_population(population, self.capacity);
                SimulationState::seeded(layout, self.start_infected, measures, &mut self.rng)
            }
            _ => SimulationState::empty(measures),
        };
    }

    /// Advances one timestep. Returns false, doing nothing, when the engine is not runnable.
    pub fn next_timestep(&mut self) -> bool {
        let (Some(disease), Some(recovery)) = (&self.disease, &self.recovery) else {
            return false;
        };
        if self.population.is_none() {
            return false;
        }

        let step_start_time = Instant::now();
        let step = self.state.timestep + 1;

        let vaccinated = self.state.measures.vaccinated_fraction;
        let lockdown_enabled = self.state.measures.lockdown_enabled;
        let lockdown_intensity = self.state.measures.lockdown_intensity;
        let (infection_chance, move_chance) =
            step_chances(disease.r0, &self.state.measures, self.state.lockdown.is_active());

        let ctx = StepContext {
            step,
            infection_chance,
            quarantine: self.state.measures.quarantine(),
            mortality_chance: disease.mortality_rate * (1.0 - vaccinated / 2.0),
            recovery,
            incubation_period: disease.incubation_period,
            move_chance,
        };

        // --- 1 + 2. Infection and recovery (parallel over cells) ---
        let infect_seed: u64 = self.rng.random();
        let new_cases: u64 = self
            .state
            .grid
            .cells_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(idx, cell)| {
                let mut rng = cell_rng(infect_seed, idx);
                infect_and_resolve(cell, &ctx, &mut rng)
            })
            .sum();

        // --- 3. Aggregate ---
        let mut counts = self.state.counts();
        counts.new_cases = new_cases;

        // --- 4. Movement ---
        let move_seed: u64 = self.rng.random();
        move_individuals(&mut self.state.grid, &ctx, move_seed);

        // --- 5. Lockdown controller ---
        let population = counts.population();
        if lockdown_enabled && population > 0 {
            let infected_fraction = counts.infected as f64 / population as f64;
            match self.state.lockdown.update(lockdown_intensity, infected_fraction) {
                Some(LockdownTransition::Started) => info!(
                    "Lockdown started at timestep {} ({:.2}% infected).",
                    step,
                    infected_fraction * 100.0
                ),
                Some(LockdownTransition::Ended) => info!(
                    "Lockdown ended at timestep {} ({:.2}% infected).",
                    step,
                    infected_fraction * 100.0
                ),
                None => {}
            }
        }

        // --- 6. Record and advance ---
        self.state.series.push(counts);
        self.state.timestep = step;

        debug!(
            "Timestep {}: S={} I={} R={} D={} new={}",
            step, counts.susceptible, counts.infected, counts.recovered, counts.dead, counts.new_cases
        );
        trace!(
            "Timestep {} computed in {:.2} ms",
            step,
            step_start_time.elapsed().as_secs_f64() * 1000.0
        );
        true
    }

    pub fn series(&self) -> &TimeSeries {
        &self.state.series
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Last completed timestep.
    pub fn timestep(&self) -> u32 {
        self.state.timestep
    }

    pub fn counts(&self) -> TimestepCounts {
        self.state.series.last().unwrap_or_default()
    }

    pub fn lockdown_active(&self) -> bool {
        self.state.lockdown.is_active()
    }

    pub fn measures(&self) -> &PreventativeMeasures {
        &self.state.measures
    }

    pub fn total_individuals(&self) -> u64 {
        self.state.total_individuals
    }

    pub fn grid_width(&self) -> usize {
        self.state.grid.width()
    }

    pub fn population(&self) -> Option<&PopulationParameters> {
        self.population.as_ref()
    }

    pub fn disease(&self) -> Option<&EpidemicParameters> {
        self.disease.as_ref()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn start_infected(&self) -> u32 {
        self.start_infected
    }
}
