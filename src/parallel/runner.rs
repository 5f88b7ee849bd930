//! Drives the three parallel passes on a compute substrate

use crate::config::{BundleConfig, OverflowPolicy};
use crate::error::{BundleError, BundleResult};
use crate::geometry::Point;
use crate::graph::PreparedGraph;
use crate::parallel::layout::TileLayout;
use crate::parallel::pingpong::PingPong;
use crate::parallel::substrate::{BufferId, ComputeSubstrate, Kernel, KernelParams};
use crate::schedule::{CycleSchedule, Phase};

/// Parallel force-directed edge bundling on a [`ComputeSubstrate`].
///
/// All buffers allocated by a run are released before `run` returns, on
/// success or failure. Compiled kernels are released too unless
/// `keep_kernels` is set.
pub struct ParallelBundler<'a, S: ComputeSubstrate> {
    config: &'a BundleConfig,
    substrate: &'a mut S,
    phase: Phase,
}

impl<'a, S: ComputeSubstrate> ParallelBundler<'a, S> {
    pub fn new(config: &'a BundleConfig, substrate: &'a mut S) -> Self {
        Self {
            config,
            substrate,
            phase: Phase::Initializing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Bundle the prepared edges, returning one polyline per edge.
    pub fn run(&mut self, graph: &PreparedGraph) -> BundleResult<Vec<Vec<Point>>> {
        self.config.validate()?;
        self.phase = Phase::Initializing;
        if graph.is_empty() {
            self.phase = Phase::Done;
            return Ok(Vec::new());
        }

        let max_extent = match self.config.max_extent {
            Some(limit) => limit.min(self.substrate.max_extent()),
            None => self.substrate.max_extent(),
        };
        // validate() guarantees the point count fits
        let points_per_edge = self.config.points_per_edge().unwrap_or(u32::MAX);
        let layout = TileLayout::new(
            graph.len(),
            points_per_edge,
            self.config.max_compatible_edges,
            max_extent,
        )?;
        if layout.tiles > 1 {
            tracing::info!(tiles = layout.tiles, "edge count exceeds buffer extent, tiling");
        }
        tracing::debug!(
            rows = layout.rows,
            tiles = layout.tiles,
            columns = layout.point_columns(),
            "parallel buffer layout"
        );

        let mut buffers = Vec::with_capacity(3);
        let result = self.execute(graph, &layout, &mut buffers);

        for buffer in buffers {
            self.substrate.release(buffer);
        }
        if !self.config.keep_kernels {
            self.substrate.release_kernels();
        }
        result
    }

    fn execute(
        &mut self,
        graph: &PreparedGraph,
        layout: &TileLayout,
        buffers: &mut Vec<BufferId>,
    ) -> BundleResult<Vec<Vec<Point>>> {
        for kernel in Kernel::ALL {
            if !self.substrate.is_compiled(kernel) {
                self.substrate.compile(kernel)?;
            }
        }

        let initial = layout.encode_endpoints(&graph.edges);
        let a = self
            .substrate
            .allocate(initial.width, initial.height, Some(&initial.data))?;
        buffers.push(a);
        let b = self
            .substrate
            .allocate(layout.point_columns(), layout.rows, None)?;
        buffers.push(b);
        let compatibility = self
            .substrate
            .allocate(layout.compat_columns(), layout.rows, None)?;
        buffers.push(compatibility);

        let mut points = PingPong::new(a, b);
        let mut params = KernelParams {
            stiffness: self.config.stiffness,
            threshold: self.config.compatibility_threshold,
            ..layout.params()
        };

        self.substrate.bind_target(compatibility)?;
        self.substrate
            .dispatch(Kernel::Compatibility, &params, &[*points.read()])?;
        self.check_capacity(layout, compatibility)?;

        for cycle in CycleSchedule::new(self.config) {
            self.phase = Phase::Cycling(cycle.index);
            tracing::debug!(
                cycle = cycle.index,
                subdivisions = cycle.subdivisions,
                iterations = cycle.iterations,
                step_size = cycle.step_size,
                "starting cycle"
            );

            params.subdivisions = cycle.subdivisions as u32;
            params.step_size = cycle.step_size;

            self.substrate.bind_target(*points.write())?;
            self.substrate
                .dispatch(Kernel::Subdivision, &params, &[*points.read()])?;
            points.swap();

            for _ in 0..cycle.iterations {
                self.substrate.bind_target(*points.write())?;
                self.substrate
                    .dispatch(Kernel::Update, &params, &[*points.read(), compatibility])?;
                points.swap();
            }

            params.previous_subdivisions = params.subdivisions;
        }

        let data = self.substrate.read_back(*points.read())?;
        self.phase = Phase::Done;
        Ok(layout.decode_paths(&data, &graph.edges, params.subdivisions))
    }

    /// Enforce the overflow policy on the compatibility pass output.
    fn check_capacity(&mut self, layout: &TileLayout, compatibility: BufferId) -> BundleResult<()> {
        let data = self.substrate.read_back(compatibility)?;
        for edge in 0..layout.edge_count {
            let count = layout.compatible_count(&data, edge);
            if count <= layout.capacity as usize {
                continue;
            }
            match self.config.overflow {
                OverflowPolicy::Error => {
                    return Err(BundleError::CompatibilityOverflow {
                        edge: edge as usize,
                        count,
                        capacity: layout.capacity,
                    });
                }
                OverflowPolicy::Truncate => {
                    tracing::warn!(
                        edge,
                        count,
                        capacity = layout.capacity,
                        "dropping compatible edges beyond capacity"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::cpu::CpuSubstrate;

    fn fan(count: usize) -> PreparedGraph {
        PreparedGraph::from_segments((0..count).map(|i| {
            let y = i as f64;
            (Point::planar(0.0, y), Point::planar(50.0, y))
        }))
    }

    #[test]
    fn test_releases_buffers_and_kernels() {
        let config = BundleConfig::default().with_cycles(1);
        let mut substrate = CpuSubstrate::new();
        let paths = ParallelBundler::new(&config, &mut substrate)
            .run(&fan(3))
            .unwrap();

        assert_eq!(paths.len(), 3);
        assert_eq!(substrate.live_buffers(), 0);
        assert!(!substrate.is_compiled(Kernel::Update));
    }

    #[test]
    fn test_keep_kernels() {
        let config = BundleConfig::default().with_cycles(1).with_keep_kernels(true);
        let mut substrate = CpuSubstrate::new();
        ParallelBundler::new(&config, &mut substrate)
            .run(&fan(2))
            .unwrap();
        assert!(Kernel::ALL.iter().all(|&k| substrate.is_compiled(k)));
        assert_eq!(substrate.live_buffers(), 0);
    }

    #[test]
    fn test_zero_extent_substrate_is_an_error() {
        let config = BundleConfig::default().with_cycles(1);
        let mut substrate = CpuSubstrate::with_max_extent(0);
        let err = ParallelBundler::new(&config, &mut substrate)
            .run(&fan(1))
            .unwrap_err();

        assert!(matches!(
            err,
            BundleError::ProblemTooLarge {
                required: 1,
                max_extent: 0
            }
        ));
        assert_eq!(substrate.live_buffers(), 0);
    }

    #[test]
    fn test_overflow_error_releases_everything() {
        let config = BundleConfig::default()
            .with_cycles(1)
            .with_max_compatible_edges(2);
        let mut substrate = CpuSubstrate::new();
        let mut bundler = ParallelBundler::new(&config, &mut substrate);
        let err = bundler.run(&fan(5)).unwrap_err();

        assert_eq!(bundler.phase(), Phase::Initializing);
        assert!(matches!(
            err,
            BundleError::CompatibilityOverflow { capacity: 2, .. }
        ));
        assert_eq!(substrate.live_buffers(), 0);
    }

    #[test]
    fn test_overflow_truncate_completes() {
        let config = BundleConfig::default()
            .with_cycles(1)
            .with_max_compatible_edges(2)
            .with_overflow(OverflowPolicy::Truncate);
        let mut substrate = CpuSubstrate::new();
        let paths = ParallelBundler::new(&config, &mut substrate)
            .run(&fan(5))
            .unwrap();
        assert!(paths.iter().all(|p| p.len() == 4));
    }

    #[test]
    fn test_problem_too_large() {
        let config = BundleConfig::default().with_max_extent(8);
        let mut substrate = CpuSubstrate::new();
        let err = ParallelBundler::new(&config, &mut substrate)
            .run(&fan(3))
            .unwrap_err();
        assert!(matches!(err, BundleError::ProblemTooLarge { .. }));
        assert_eq!(substrate.live_buffers(), 0);
    }
}
