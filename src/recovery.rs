/// First relative day covered by the table.
pub const WINDOW_START: i64 = -10;
/// Last relative day covered by the table.
pub const WINDOW_END: i64 = 9;

/// Cumulative recovery chance keyed on how far an infection has run past the
/// disease's mean infectious period.
///
/// The table accumulates the standard normal density sampled at each integer
/// day of the window. This is a pointwise sum, not the analytic CDF: the
/// midpoint is well above one half and the tail settles a hair past one.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryModel {
    infectious_period: u32,
    table: Vec<f64>,
}

fn standard_normal_density(x: f64) -> f64 {
    (-(x * x) / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

impl RecoveryModel {
    pub fn new(infectious_period: u32) -> Self {
        let mut cumulative = 0.0;
        let table = (WINDOW_START..=WINDOW_END)
            .map(|day| {
                cumulative += standard_normal_density(day as f64);
                cumulative
            })
            .collect();
        Self {
            infectious_period,
            table,
        }
    }

    pub fn infectious_period(&self) -> u32 {
        self.infectious_period
    }

    /// Recovery chance at `offset` days relative to the mean infectious period.
    pub fn lookup(&self, offset: i64) -> f64 {
        if offset > WINDOW_END {
            1.0
        } else if offset < WINDOW_START {
            0.0
        } else {
            self.table[(offset - WINDOW_START) as usize]
        }
    }

    /// Recovery chance for an individual infected for `infection_age` steps.
    pub fn chance_for_age(&self, infection_age: u32) -> f64 {
        self.lookup(infection_age as i64 - self.infectious_period as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_window_saturates() {
        let model = RecoveryModel::new(9);
        assert_eq!(model.lookup(10), 1.0);
        assert_eq!(model.lookup(250), 1.0);
        assert_eq!(model.lookup(-11), 0.0);
        assert_eq!(model.lookup(-400), 0.0);
    }

    #[test]
    fn table_is_non_decreasing_and_ends_near_one() {
        let model = RecoveryModel::new(9);
        let mut previous = 0.0;
        for day in WINDOW_START..=WINDOW_END {
            let p = model.lookup(day);
            assert!(p >= previous, "dropped at day {}", day);
            previous = p;
        }
        assert!((model.lookup(WINDOW_END) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn accumulates_pointwise_density() {
        let model = RecoveryModel::new(9);
        assert_eq!(model.lookup(-10), standard_normal_density(-10.0));
        let through_zero: f64 = (-10..=0).map(|d| standard_normal_density(d as f64)).sum();
        assert!((model.lookup(0) - through_zero).abs() < 1e-12);
        // Sampling at integers overshoots the true CDF value of 0.5 at the mean.
        assert!(model.lookup(0) > 0.5);
    }

    #[test]
    fn age_is_relative_to_infectious_period() {
        let model = RecoveryModel::new(9);
        assert_eq!(model.chance_for_age(9), model.lookup(0));
        assert_eq!(model.chance_for_age(0), model.lookup(-9));
        assert_eq!(model.chance_for_age(19), 1.0);
    }
}
