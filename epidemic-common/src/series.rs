use serde::{Deserialize, Serialize};

/// Aggregate counts for a single timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepCounts {
    pub susceptible: u64,
    pub infected: u64,
    pub recovered: u64,
    pub dead: u64,
    pub new_cases: u64,
}

impl TimestepCounts {
    /// Individuals across the four bins; `new_cases` is a flow and is not included.
    pub fn population(&self) -> u64 {
        self.susceptible + self.infected + self.recovered + self.dead
    }

    pub fn get(&self, kind: SeriesKind) -> u64 {
        match kind {
            SeriesKind::Susceptible => self.susceptible,
            SeriesKind::Infected => self.infected,
            SeriesKind::Recovered => self.recovered,
            SeriesKind::Dead => self.dead,
            SeriesKind::NewCases => self.new_cases,
        }
    }
}

/// One of the five per-timestep series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Susceptible,
    Infected,
    Recovered,
    Dead,
    NewCases,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 5] = [
        SeriesKind::Susceptible,
        SeriesKind::Infected,
        SeriesKind::Recovered,
        SeriesKind::Dead,
        SeriesKind::NewCases,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Short legend label.
    pub fn label(self) -> &'static str {
        match self {
            SeriesKind::Susceptible => "Sus",
            SeriesKind::Infected => "Inf",
            SeriesKind::Recovered => "Rec",
            SeriesKind::Dead => "Dead",
            SeriesKind::NewCases => "New",
        }
    }
}

/// Which series are visible, indexed by `SeriesKind::index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMask(pub [bool; 5]);

impl Default for SeriesMask {
    // Infected and new cases are shown unless the caller says otherwise.
    fn default() -> Self {
        SeriesMask([false, true, false, false, true])
    }
}

impl SeriesMask {
    pub const NONE: SeriesMask = SeriesMask([false; 5]);
    pub const ALL: SeriesMask = SeriesMask([true; 5]);

    pub fn only(kinds: &[SeriesKind]) -> Self {
        let mut mask = Self::NONE;
        for kind in kinds {
            mask.0[kind.index()] = true;
        }
        mask
    }

    pub fn contains(&self, kind: SeriesKind) -> bool {
        self.0[kind.index()]
    }

    pub fn visible(&self) -> impl Iterator<Item = SeriesKind> + '_ {
        SeriesKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

/// Five parallel append-only series indexed by timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub susceptible: Vec<u64>,
    pub infected: Vec<u64>,
    pub recovered: Vec<u64>,
    pub dead: Vec<u64>,
    pub new_cases: Vec<u64>,
}

impl TimeSeries {
    /// A series holding only the timestep-0 entry.
    pub fn seeded(initial: TimestepCounts) -> Self {
        let mut series = Self::default();
        series.push(initial);
        series
    }

    pub fn push(&mut self, counts: TimestepCounts) {
        self.susceptible.push(counts.susceptible);
        self.infected.push(counts.infected);
        self.recovered.push(counts.recovered);
        self.dead.push(counts.dead);
        self.new_cases.push(counts.new_cases);
    }

    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.susceptible.is_empty()
    }

    pub fn get(&self, kind: SeriesKind) -> &[u64] {
        match kind {
            SeriesKind::Susceptible => &self.susceptible,
            SeriesKind::Infected => &self.infected,
            SeriesKind::Recovered => &self.recovered,
            SeriesKind::Dead => &self.dead,
            SeriesKind::NewCases => &self.new_cases,
        }
    }

    pub fn at(&self, timestep: usize) -> Option<TimestepCounts> {
        if timestep >= self.len() {
            return None;
        }
        Some(TimestepCounts {
            susceptible: self.susceptible[timestep],
            infected: self.infected[timestep],
            recovered: self.recovered[timestep],
            dead: self.dead[timestep],
            new_cases: self.new_cases[timestep],
        })
    }

    pub fn last(&self) -> Option<TimestepCounts> {
        self.len().checked_sub(1).and_then(|t| self.at(t))
    }

    /// Copy of the first `timestep + 1` entries of every series (fewer if history is shorter).
    pub fn prefix_through(&self, timestep: usize) -> TimeSeries {
        let end = timestep.saturating_add(1).min(self.len());
        TimeSeries {
            susceptible: self.susceptible[..end].to_vec(),
            infected: self.infected[..end].to_vec(),
            recovered: self.recovered[..end].to_vec(),
            dead: self.dead[..end].to_vec(),
            new_cases: self.new_cases[..end].to_vec(),
        }
    }

    /// Largest value over the masked series within timesteps `0..=timestep`.
    pub fn max_through(&self, mask: SeriesMask, timestep: usize) -> u64 {
        let end = timestep.saturating_add(1).min(self.len());
        mask.visible()
            .filter_map(|kind| self.get(kind)[..end].iter().copied().max())
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = TimestepCounts> + '_ {
        (0..self.len()).filter_map(move |t| self.at(t))
    }
}
