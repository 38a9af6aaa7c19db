use crate::individual::{Bin, Individual};
use rand::Rng;
use rand_distr::StandardNormal;

/// Standard deviation of a single move, in cells.
pub const MOVE_STD_DEV: f64 = 100.0;

/// One spatial unit: four disjoint bins of individuals. Order within a bin carries no meaning.
#[derive(Debug, Default)]
pub struct Cell {
    bins: [Vec<Individual>; 4],
}

impl Cell {
    pub fn bin(&self, bin: Bin) -> &[Individual] {
        &self.bins[bin.index()]
    }

    pub fn bin_mut(&mut self, bin: Bin) -> &mut Vec<Individual> {
        &mut self.bins[bin.index()]
    }

    #[inline(always)]
    pub fn count(&self, bin: Bin) -> usize {
        self.bin(bin).len()
    }

    pub fn len(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(Vec::is_empty)
    }

    pub fn push(&mut self, bin: Bin, individual: Individual) {
        self.bins[bin.index()].push(individual);
    }

    /// Empties a bin and hands its contents to the caller.
    pub fn take(&mut self, bin: Bin) -> Vec<Individual> {
        std::mem::take(&mut self.bins[bin.index()])
    }

    /// O(1) removal; the last member of the bin fills the gap.
    pub fn remove(&mut self, bin: Bin, index: usize) -> Option<Individual> {
        let members = &mut self.bins[bin.index()];
        if index < members.len() {
            Some(members.swap_remove(index))
        } else {
            None
        }
    }
}

/// Square matrix of cells, stored row-major.
#[derive(Debug)]
pub struct Grid {
    width: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Allocates `width x width` empty cells.
    pub fn new(width: usize) -> Self {
        let cells = (0..width * width).map(|_| Cell::default()).collect();
        Self { width, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    // Calculates the 1D cell index for a (row, col) pair
    #[inline(always)]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        let index = self.cell_index(row, col);
        &mut self.cells[index]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Places `per_cell` fresh susceptible individuals in every cell.
    pub fn populate_evenly(&mut self, per_cell: usize) {
        for cell in &mut self.cells {
            let susceptible = cell.bin_mut(Bin::Susceptible);
            susceptible.reserve(per_cell);
            susceptible.extend((0..per_cell).map(|_| Individual::susceptible()));
        }
    }

    pub fn total(&self, bin: Bin) -> u64 {
        self.cells.iter().map(|cell| cell.count(bin) as u64).sum()
    }

    pub fn total_individuals(&self) -> u64 {
        self.cells.iter().map(|cell| cell.len() as u64).sum()
    }
}

/// Where an individual at (row, col) ends up after one movement draw.
///
/// With probability `1 - move_chance` it stays put. Otherwise one axis is
/// picked and a displacement drawn from N(width/2 - coord, MOVE_STD_DEV), which
/// pulls individuals toward the centre. A draw that would leave the grid is
/// replaced by the mean itself.
pub fn new_location<R: Rng + ?Sized>(
    row: usize,
    col: usize,
    width: usize,
    move_chance: f64,
    rng: &mut R,
) -> (usize, usize) {
    if width == 0 || rng.random::<f64>() >= move_chance {
        return (row, col);
    }

    let mut pos = [row as i64, col as i64];
    let axis = rng.random_range(0..2usize);
    let limit = width as f64;
    let mean = limit / 2.0 - pos[axis] as f64;

    let z: f64 = rng.sample(StandardNormal);
    let mut displacement = mean + MOVE_STD_DEV * z;
    let target = pos[axis] as f64 + displacement;
    if target >= limit || target <= 0.0 {
        displacement = mean;
    }
    // Truncates toward zero.
    pos[axis] += displacement as i64;

    // The mean fallback already lands inside; the clamp keeps indexing total.
    let max = width as i64 - 1;
    (pos[0].clamp(0, max) as usize, pos[1].clamp(0, max) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn even_population_and_totals() {
        let mut grid = Grid::new(3);
        grid.populate_evenly(4);
        assert_eq!(grid.cells().len(), 9);
        assert_eq!(grid.total(Bin::Susceptible), 36);
        assert_eq!(grid.total_individuals(), 36);
        assert_eq!(grid.width(), 3);
    }

    #[test]
    fn removal_hands_over_one_individual() {
        let mut cell = Cell::default();
        for _ in 0..3 {
            cell.push(Bin::Susceptible, Individual::susceptible());
        }
        let mut carrier = Individual::susceptible();
        carrier.infect(2);
        cell.push(Bin::Infected, carrier);

        assert_eq!(cell.remove(Bin::Infected, 0).and_then(|i| i.infected_at()), Some(2));
        assert_eq!(cell.remove(Bin::Infected, 0), None);
        assert!(cell.remove(Bin::Susceptible, 1).is_some());
        assert_eq!(cell.count(Bin::Susceptible), 2);
        assert_eq!(cell.remove(Bin::Susceptible, 5), None);
        assert_eq!(cell.len(), 2);
    }

    #[test]
    fn cells_are_row_major() {
        let mut grid = Grid::new(7);
        assert_eq!(grid.cell_index(3, 5), 26);
        grid.cell_mut(3, 5).push(Bin::Dead, Individual::susceptible());
        assert_eq!(grid.cells()[26].count(Bin::Dead), 1);
    }

    #[test]
    fn zero_move_chance_never_moves() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(new_location(2, 7, 10, 0.0, &mut rng), (2, 7));
        }
    }

    #[test]
    fn moves_stay_in_bounds_and_on_one_axis() {
        let mut rng = StdRng::seed_from_u64(99);
        let width = 9;
        let mut moved = 0;
        for i in 0..5000 {
            let (row, col) = (i % width, (i * 7) % width);
            let (new_row, new_col) = new_location(row, col, width, 1.0, &mut rng);
            assert!(new_row < width && new_col < width);
            assert!(new_row == row || new_col == col);
            if (new_row, new_col) != (row, col) {
                moved += 1;
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn wide_draws_fall_back_to_the_centre() {
        // sigma = 100 on a 4-wide grid: nearly every draw leaves the grid,
        // so the mean pulls the individual to coordinate 2 on the chosen axis.
        let mut rng = StdRng::seed_from_u64(3);
        let mut at_centre = 0;
        let trials = 2000;
        for _ in 0..trials {
            let (row, col) = new_location(0, 0, 4, 1.0, &mut rng);
            if row == 2 || col == 2 {
                at_centre += 1;
            }
        }
        assert!(at_centre > trials * 9 / 10);
    }
}
