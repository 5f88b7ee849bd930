//! Cycle scheduler: the cooling schedule shared by both strategies
//!
//! Cycle `c` (0..=C) runs with step size `S / 2^c`, `P * rate^c` subdivision
//! points and `I * I_rate^c` iterations.

use crate::config::BundleConfig;

/// Lifecycle of a bundling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building initial paths and compatibility lists
    Initializing,
    /// Running cycle `n`
    Cycling(u32),
    /// All cycles completed
    Done,
}

/// Parameters of one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cycle {
    pub index: u32,
    /// Interior points per edge during this cycle
    pub subdivisions: usize,
    /// Force iterations to run
    pub iterations: usize,
    /// Step size applied to the net force
    pub step_size: f64,
}

/// Whole iterations for a decayed real-valued count.
///
/// Runs `ceil(i)` iterations, but values within 1e-6 of an integer snap to it
/// so that `90 * (2/3)` yields 60 rather than 61.
pub fn iteration_count(iterations: f64) -> usize {
    let nearest = iterations.round();
    if (iterations - nearest).abs() < 1e-6 {
        nearest.max(0.0) as usize
    } else {
        iterations.ceil().max(0.0) as usize
    }
}

/// Iterator over the `C + 1` cycles of a run.
#[derive(Debug, Clone)]
pub struct CycleSchedule {
    index: u32,
    cycles: u32,
    subdivisions: usize,
    subdivision_rate: usize,
    iterations: f64,
    iteration_rate: f64,
    step_size: f64,
}

impl CycleSchedule {
    pub fn new(config: &BundleConfig) -> Self {
        Self {
            index: 0,
            cycles: config.cycles,
            subdivisions: config.subdivisions as usize,
            subdivision_rate: config.subdivision_rate as usize,
            iterations: config.iterations,
            iteration_rate: config.iteration_rate,
            step_size: config.step_size,
        }
    }

    /// Phase after the cycles yielded so far
    pub fn phase(&self) -> Phase {
        if self.index > self.cycles {
            Phase::Done
        } else {
            Phase::Cycling(self.index)
        }
    }
}

impl Iterator for CycleSchedule {
    type Item = Cycle;

    fn next(&mut self) -> Option<Cycle> {
        if self.index > self.cycles {
            return None;
        }
        let cycle = Cycle {
            index: self.index,
            subdivisions: self.subdivisions,
            iterations: iteration_count(self.iterations),
            step_size: self.step_size,
        };

        self.step_size /= 2.0;
        self.subdivisions = self.subdivisions.saturating_mul(self.subdivision_rate);
        self.iterations *= self.iteration_rate;
        self.index += 1;

        Some(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let cycles: Vec<Cycle> = CycleSchedule::new(&BundleConfig::default()).collect();
        assert_eq!(cycles.len(), 7);

        let subdivisions: Vec<usize> = cycles.iter().map(|c| c.subdivisions).collect();
        assert_eq!(subdivisions, vec![1, 2, 4, 8, 16, 32, 64]);

        let iterations: Vec<usize> = cycles.iter().map(|c| c.iterations).collect();
        assert_eq!(iterations, vec![90, 60, 40, 27, 18, 12, 8]);

        assert_eq!(cycles[0].step_size, 0.1);
        assert_eq!(cycles[3].step_size, 0.1 / 8.0);
    }

    #[test]
    fn test_iteration_count_snaps() {
        assert_eq!(iteration_count(60.000_000_1), 60);
        assert_eq!(iteration_count(59.999_999_9), 60);
        assert_eq!(iteration_count(26.67), 27);
        assert_eq!(iteration_count(0.0), 0);
    }

    #[test]
    fn test_phase_progression() {
        let config = BundleConfig::default().with_cycles(1);
        let mut schedule = CycleSchedule::new(&config);
        assert_eq!(schedule.phase(), Phase::Cycling(0));
        schedule.next();
        assert_eq!(schedule.phase(), Phase::Cycling(1));
        schedule.next();
        assert_eq!(schedule.phase(), Phase::Done);
        assert!(schedule.next().is_none());
    }
}
