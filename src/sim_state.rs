use crate::grid::Grid;
use crate::individual::Bin;
use crate::lockdown::LockdownController;
use epidemic_common::{PopulationParameters, PreventativeMeasures, TimeSeries, TimestepCounts};
use log::{info, warn};
use rand::Rng;

/// Grid geometry derived from a location and the simulation capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Individuals requested before rounding down to a whole number per cell.
    pub individuals: u64,
    pub width: usize,
    pub per_cell: usize,
}

impl GridLayout {
    /// Populations above `capacity` are capped and the grid shrunk so density is preserved.
    pub fn for_population(population: &PopulationParameters, capacity: u32) -> Self {
        let (individuals, width) = if population.population > capacity as u64 {
            let width = (capacity as f64 / population.density()).sqrt().floor();
            (capacity as u64, width)
        } else {
            (population.population, population.area.sqrt().floor())
        };
        // Sub-unit areas would otherwise produce an empty grid.
        let width = width.max(1.0);
        if width * width > individuals as f64 {
            // Fewer people than cells: the even split places nobody, whatever the width.
            warn!(
                "{} individuals cannot fill a {}x{} grid; nobody will be placed.",
                individuals, width, width
            );
            return Self {
                individuals,
                width: 1,
                per_cell: 0,
            };
        }
        // Bounded by `individuals` from here on.
        let width = width as usize;
        let per_cell = (individuals / (width * width) as u64) as usize;
        Self {
            individuals,
            width,
            per_cell,
        }
    }

    /// Individuals actually placed; the remainder of the even split is dropped.
    pub fn seeded_individuals(&self) -> u64 {
        (self.per_cell * self.width * self.width) as u64
    }
}

/// Mutable state of one run, owned by the engine.
#[derive(Debug)]
pub struct SimulationState {
    pub grid: Grid,
    /// Last completed timestep; 0 is the seed state.
    pub timestep: u32,
    pub series: TimeSeries,
    pub measures: PreventativeMeasures,
    pub lockdown: LockdownController,
    pub total_individuals: u64,
}

impl SimulationState {
    /// Placeholder state for an engine missing its location or disease.
    pub fn empty(measures: PreventativeMeasures) -> Self {
        Self {
            grid: Grid::new(0),
            timestep: 0,
            series: TimeSeries::seeded(TimestepCounts::default()),
            measures,
            lockdown: LockdownController::default(),
            total_individuals: 0,
        }
    }

    /// Fills a fresh grid evenly and infects `start_infected` individuals at timestep 0.
    pub fn seeded<R: Rng + ?Sized>(
        layout: GridLayout,
        start_infected: u32,
        measures: PreventativeMeasures,
        rng: &mut R,
    ) -> Self {
        let mut grid = Grid::new(layout.width);
        grid.populate_evenly(layout.per_cell);
        let total_individuals = layout.seeded_individuals();

        let mut start = start_infected as u64;
        if start > total_individuals {
            warn!(
                "Requested {} starting infections but only {} individuals are simulated. Infecting all of them.",
                start, total_individuals
            );
            start = total_individuals;
        }

        let width = layout.width;
        let mut placed = 0;
        while placed < start {
            let row = rng.random_range(0..width);
            let col = rng.random_range(0..width);
            let cell = grid.cell_mut(row, col);
            let available = cell.count(Bin::Susceptible);
            // Cells drained by earlier picks are skipped and another is drawn.
            if available == 0 {
                continue;
            }
            let pick = rng.random_range(0..available);
            if let Some(mut individual) = cell.remove(Bin::Susceptible, pick) {
                individual.infect(0);
                cell.push(Bin::Infected, individual);
                placed += 1;
            }
        }

        info!(
            "Seeded {}x{} grid with {} individuals ({} per cell), {} infected.",
            width, width, total_individuals, layout.per_cell, start
        );

        let initial = TimestepCounts {
            susceptible: total_individuals - start,
            infected: start,
            ..Default::default()
        };

        Self {
            grid,
            timestep: 0,
            series: TimeSeries::seeded(initial),
            measures,
            lockdown: LockdownController::default(),
            total_individuals,
        }
    }

    /// Current bin totals across the grid.
    pub fn counts(&self) -> TimestepCounts {
        TimestepCounts {
            susceptible: self.grid.total(Bin::Susceptible),
            infected: self.grid.total(Bin::Infected),
            recovered: self.grid.total(Bin::Recovered),
            dead: self.grid.total(Bin::Dead),
            new_cases: 0,
        }
    }
}
