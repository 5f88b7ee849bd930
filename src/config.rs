//! Bundling configuration
//!
//! [`BundleConfig`] is an immutable value handed to each run. Defaults follow
//! the parameters of Holten & van Wijk's force-directed edge bundling paper as
//! used by the d3 plugin.

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, BundleResult};

// =============================================================================
// Default Constants
// =============================================================================

/// Default bundling stiffness K (spring constant between subdivision points)
pub const DEFAULT_STIFFNESS: f64 = 0.1;

/// Default initial step size S (distance scale applied to the net force)
pub const DEFAULT_STEP_SIZE: f64 = 0.1;

/// Default initial subdivision point count P
pub const DEFAULT_SUBDIVISIONS: u32 = 1;

/// Default factor by which P grows each cycle
pub const DEFAULT_SUBDIVISION_RATE: u32 = 2;

/// Default number of cycles after the first (C + 1 cycles run)
pub const DEFAULT_CYCLES: u32 = 6;

/// Default iteration count for the first cycle
pub const DEFAULT_ITERATIONS: f64 = 90.0;

/// Default factor by which the iteration count decays each cycle
pub const DEFAULT_ITERATION_RATE: f64 = 2.0 / 3.0;

/// Default minimum compatibility score for two edges to interact
pub const DEFAULT_COMPATIBILITY_THRESHOLD: f64 = 0.6;

/// Default per-edge compatible-edge capacity of the parallel mapping
pub const DEFAULT_MAX_COMPATIBLE_EDGES: u32 = 500;

/// Which execution strategy runs the bundling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Single-threaded reference solver
    #[default]
    Sequential,
    /// Data-parallel passes over fixed-shape buffers
    Parallel,
}

/// What the parallel mapping does when an edge has more compatible edges than
/// `max_compatible_edges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Abort the run with [`BundleError::CompatibilityOverflow`]
    #[default]
    Error,
    /// Keep the first `max_compatible_edges` neighbours (lowest indices) and log a warning
    Truncate,
}

/// Configuration for a bundling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Bundling stiffness K
    pub stiffness: f64,
    /// Initial step size S, halved after every cycle
    pub step_size: f64,
    /// Subdivision point count for the first cycle
    pub subdivisions: u32,
    /// Growth factor of the subdivision count per cycle
    pub subdivision_rate: u32,
    /// Number of cycles after the first
    pub cycles: u32,
    /// Iteration count for the first cycle
    pub iterations: f64,
    /// Decay factor of the iteration count per cycle
    pub iteration_rate: f64,
    /// Minimum product of the four compatibility scores
    pub compatibility_threshold: f64,
    /// Per-edge neighbour capacity of the parallel compatibility buffer
    pub max_compatible_edges: u32,
    /// Policy when an edge exceeds `max_compatible_edges`
    pub overflow: OverflowPolicy,
    /// Execution strategy
    pub strategy: Strategy,
    /// Keep compiled kernels on the substrate after a parallel run
    pub keep_kernels: bool,
    /// Lower bound on the substrate's maximum buffer extent (forces tiling)
    pub max_extent: Option<u32>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            stiffness: DEFAULT_STIFFNESS,
            step_size: DEFAULT_STEP_SIZE,
            subdivisions: DEFAULT_SUBDIVISIONS,
            subdivision_rate: DEFAULT_SUBDIVISION_RATE,
            cycles: DEFAULT_CYCLES,
            iterations: DEFAULT_ITERATIONS,
            iteration_rate: DEFAULT_ITERATION_RATE,
            compatibility_threshold: DEFAULT_COMPATIBILITY_THRESHOLD,
            max_compatible_edges: DEFAULT_MAX_COMPATIBLE_EDGES,
            overflow: OverflowPolicy::default(),
            strategy: Strategy::default(),
            keep_kernels: false,
            max_extent: None,
        }
    }
}

impl BundleConfig {
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_subdivisions(mut self, subdivisions: u32, rate: u32) -> Self {
        self.subdivisions = subdivisions;
        self.subdivision_rate = rate;
        self
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_iterations(mut self, iterations: f64, rate: f64) -> Self {
        self.iterations = iterations;
        self.iteration_rate = rate;
        self
    }

    pub fn with_compatibility_threshold(mut self, threshold: f64) -> Self {
        self.compatibility_threshold = threshold;
        self
    }

    pub fn with_max_compatible_edges(mut self, capacity: u32) -> Self {
        self.max_compatible_edges = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_keep_kernels(mut self, keep: bool) -> Self {
        self.keep_kernels = keep;
        self
    }

    pub fn with_max_extent(mut self, extent: u32) -> Self {
        self.max_extent = Some(extent);
        self
    }

    /// Subdivision point count of the final cycle: `P_initial * P_rate^C`
    pub fn final_subdivisions(&self) -> Option<u32> {
        self.subdivision_rate
            .checked_pow(self.cycles)
            .and_then(|growth| growth.checked_mul(self.subdivisions))
    }

    /// Points per output polyline, endpoints included
    pub fn points_per_edge(&self) -> Option<u32> {
        self.final_subdivisions().and_then(|p| p.checked_add(2))
    }

    /// Reject values the solver cannot run with.
    pub fn validate(&self) -> BundleResult<()> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> BundleError {
            BundleError::InvalidConfig {
                field,
                reason: reason.into(),
            }
        }

        if !self.stiffness.is_finite() || self.stiffness < 0.0 {
            return Err(invalid("stiffness", "must be a finite, non-negative number"));
        }
        if !self.step_size.is_finite() || self.step_size < 0.0 {
            return Err(invalid("step_size", "must be a finite, non-negative number"));
        }
        if self.subdivisions == 0 {
            return Err(invalid("subdivisions", "must be at least 1"));
        }
        if self.subdivision_rate == 0 {
            return Err(invalid("subdivision_rate", "must be at least 1"));
        }
        if !self.iterations.is_finite() || self.iterations < 0.0 {
            return Err(invalid("iterations", "must be a finite, non-negative number"));
        }
        if !self.iteration_rate.is_finite() || self.iteration_rate <= 0.0 {
            return Err(invalid("iteration_rate", "must be a finite, positive number"));
        }
        if !self.compatibility_threshold.is_finite() {
            return Err(invalid("compatibility_threshold", "must be finite"));
        }
        if self.max_compatible_edges == 0 {
            return Err(invalid("max_compatible_edges", "must be at least 1"));
        }
        if self.max_extent == Some(0) {
            return Err(invalid("max_extent", "must be at least 1"));
        }
        if self.points_per_edge().is_none() {
            return Err(invalid(
                "cycles",
                format!(
                    "{} * {}^{} subdivision points overflows",
                    self.subdivisions, self.subdivision_rate, self.cycles
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_per_edge() {
        // 1 * 2^6 + 2
        assert_eq!(BundleConfig::default().points_per_edge(), Some(66));
    }

    #[test]
    fn test_default_validates() {
        assert!(BundleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_subdivisions() {
        let config = BundleConfig::default().with_subdivisions(0, 2);
        let err = config.validate().unwrap_err();
        insta::assert_snapshot!(err, @"invalid configuration: subdivisions must be at least 1");
    }

    #[test]
    fn test_rejects_overflowing_cycles() {
        let config = BundleConfig::default().with_cycles(40);
        assert!(config.points_per_edge().is_none());
        assert!(matches!(
            config.validate(),
            Err(BundleError::InvalidConfig { field: "cycles", .. })
        ));
    }

    #[test]
    fn test_rejects_negative_step() {
        let config = BundleConfig::default().with_step_size(-0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: BundleConfig =
            serde_json::from_str(r#"{"cycles": 3, "strategy": "parallel"}"#).unwrap();
        assert_eq!(config.cycles, 3);
        assert_eq!(config.strategy, Strategy::Parallel);
        assert_eq!(config.stiffness, DEFAULT_STIFFNESS);
        assert_eq!(config.overflow, OverflowPolicy::Error);
    }
}
