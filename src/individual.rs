/// One simulated person. Epidemiological status is not stored here: it is the
/// bin that currently owns the individual.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Individual {
    infected_at: Option<u32>,
}

impl Individual {
    pub fn susceptible() -> Self {
        Self { infected_at: None }
    }

    pub fn infect(&mut self, timestep: u32) {
        self.infected_at = Some(timestep);
    }

    pub fn infected_at(&self) -> Option<u32> {
        self.infected_at
    }

    /// Steps since infection, or zero if never infected.
    pub fn infection_age(&self, timestep: u32) -> u32 {
        self.infected_at
            .map(|at| timestep.saturating_sub(at))
            .unwrap_or(0)
    }
}

/// The four disjoint collections held by every grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bin {
    Susceptible = 0,
    Infected = 1,
    Recovered = 2,
    Dead = 3,
}

impl Bin {
    pub fn index(self) -> usize {
        self as usize
    }
}
