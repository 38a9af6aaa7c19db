/// Ratio between the activation threshold and the release threshold.
pub const RELEASE_DIVISOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownTransition {
    Started,
    Ended,
}

/// Hysteresis controller for lockdowns.
///
/// A lockdown starts once the infected fraction rises above the intensity and
/// only ends after it falls below a fifth of it, so noise between the two
/// thresholds never toggles the flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockdownController {
    active: bool,
}

impl LockdownController {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Lifts any lockdown in force.
    pub fn clear(&mut self) {
        self.active = false;
    }

    pub fn update(&mut self, intensity: f64, infected_fraction: f64) -> Option<LockdownTransition> {
        if self.active {
            if infected_fraction < intensity / RELEASE_DIVISOR {
                self.active = false;
                return Some(LockdownTransition::Ended);
            }
        } else if infected_fraction > intensity {
            self.active = true;
            return Some(LockdownTransition::Started);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_once_each_way() {
        let mut controller = LockdownController::default();
        let fractions = [
            0.02, 0.05, 0.09, 0.11, // crosses 0.1 upward
            0.15, 0.08, 0.12, 0.05, 0.03, 0.021, // noise inside the dead-band
            0.019, // below 0.1 / 5
            0.05, 0.09, 0.1, // back inside, never above 0.1
        ];
        let transitions: Vec<_> = fractions
            .iter()
            .filter_map(|&f| controller.update(0.1, f))
            .collect();
        assert_eq!(
            transitions,
            vec![LockdownTransition::Started, LockdownTransition::Ended]
        );
        assert!(!controller.is_active());
    }

    #[test]
    fn thresholds_are_strict() {
        let mut controller = LockdownController::default();
        assert_eq!(controller.update(0.2, 0.2), None);
        assert_eq!(controller.update(0.2, 0.21), Some(LockdownTransition::Started));
        assert_eq!(controller.update(0.2, 0.045), None);
        assert!(controller.is_active());
        controller.clear();
        assert!(!controller.is_active());
    }
}
