//! Bundling entry points and the sequential reference solver

use crate::compatibility::CompatibilityLists;
use crate::config::{BundleConfig, Strategy};
use crate::error::BundleResult;
use crate::forces::ForceIntegrator;
use crate::geometry::Point;
use crate::graph::{Graph, PreparedGraph};
use crate::parallel::{ComputeSubstrate, CpuSubstrate, ParallelBundler};
use crate::schedule::{CycleSchedule, Phase};
use crate::subdivision::SubdivisionPaths;

/// The bundled polyline of one input edge
#[derive(Debug, Clone, PartialEq)]
pub struct BundledEdge {
    /// Index of the edge in the input edge list
    pub input_index: usize,
    /// `P_initial * P_rate^C + 2` points, source first and target last
    pub points: Vec<Point>,
}

/// Result of a bundling run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundledGraph {
    /// One entry per non-self-loop input edge, in input order
    pub edges: Vec<BundledEdge>,
    /// Input edges dropped as self-loops
    pub self_loops: usize,
}

impl BundledGraph {
    pub(crate) fn from_paths(prepared: &PreparedGraph, paths: Vec<Vec<Point>>) -> Self {
        let edges = prepared
            .input_indices
            .iter()
            .zip(paths)
            .map(|(&input_index, points)| BundledEdge {
                input_index,
                points,
            })
            .collect();
        Self {
            edges,
            self_loops: prepared.self_loops,
        }
    }
}

/// Sequential force-directed edge bundling.
///
/// Single-threaded and synchronous. Each iteration reads only the state left
/// by the previous iteration for every edge.
pub struct ForceBundler<'a> {
    config: &'a BundleConfig,
    phase: Phase,
}

impl<'a> ForceBundler<'a> {
    pub fn new(config: &'a BundleConfig) -> Self {
        Self {
            config,
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

        let compatibility =
            CompatibilityLists::compute(&graph.edges, self.config.compatibility_threshold);
        let mut paths = SubdivisionPaths::new(&graph.edges);
        let mut integrator =
            ForceIntegrator::new(&graph.edges, &compatibility, self.config.stiffness);

        for cycle in CycleSchedule::new(self.config) {
            self.phase = Phase::Cycling(cycle.index);
            tracing::debug!(
                cycle = cycle.index,
                subdivisions = cycle.subdivisions,
                iterations = cycle.iterations,
                step_size = cycle.step_size,
                "starting cycle"
            );

            paths.subdivide(cycle.subdivisions);
            for _ in 0..cycle.iterations {
                integrator.iterate(paths.paths_mut(), cycle.step_size);
            }
        }

        self.phase = Phase::Done;
        Ok(paths.into_paths())
    }
}

/// Bundle a graph with the strategy named in `config`.
///
/// The parallel strategy runs on the host [`CpuSubstrate`]; use
/// [`bundle_with_substrate`] to supply another substrate.
pub fn bundle(graph: &Graph, config: &BundleConfig) -> BundleResult<BundledGraph> {
    match config.strategy {
        Strategy::Sequential => {
            let prepared = PreparedGraph::from_graph(graph)?;
            log_run(&prepared, config);
            let paths = ForceBundler::new(config).run(&prepared)?;
            Ok(BundledGraph::from_paths(&prepared, paths))
        }
        Strategy::Parallel => bundle_with_substrate(graph, config, &mut CpuSubstrate::new()),
    }
}

/// Bundle a graph with the parallel mapping on the given substrate.
pub fn bundle_with_substrate<S: ComputeSubstrate>(
    graph: &Graph,
    config: &BundleConfig,
    substrate: &mut S,
) -> BundleResult<BundledGraph> {
    let prepared = PreparedGraph::from_graph(graph)?;
    log_run(&prepared, config);
    let paths = ParallelBundler::new(config, substrate).run(&prepared)?;
    Ok(BundledGraph::from_paths(&prepared, paths))
}

fn log_run(prepared: &PreparedGraph, config: &BundleConfig) {
    tracing::info!(
        edges = prepared.len(),
        self_loops = prepared.self_loops,
        strategy = ?config.strategy,
        points_per_edge = config.points_per_edge(),
        "bundling edges"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_reaches_done() {
        let config = BundleConfig::default().with_cycles(2);
        let graph =
            PreparedGraph::from_segments([(Point::planar(0.0, 0.0), Point::planar(10.0, 0.0))]);
        let mut bundler = ForceBundler::new(&config);
        assert_eq!(bundler.phase(), Phase::Initializing);

        let paths = bundler.run(&graph).unwrap();
        assert_eq!(bundler.phase(), Phase::Done);
        assert_eq!(paths[0].len(), 6);
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = BundleConfig::default().with_subdivisions(1, 0);
        let graph =
            PreparedGraph::from_segments([(Point::planar(0.0, 0.0), Point::planar(1.0, 0.0))]);
        let mut bundler = ForceBundler::new(&config);
        assert!(bundler.run(&graph).is_err());
        assert_eq!(bundler.phase(), Phase::Initializing);
    }

    #[test]
    fn test_empty_graph() {
        let result = bundle(&Graph::new(), &BundleConfig::default()).unwrap();
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_bundle_keeps_input_indices() {
        let graph = Graph::new()
            .with_node("a", Point::planar(0.0, 0.0))
            .with_node("b", Point::planar(10.0, 0.0))
            .with_edge("a", "a")
            .with_edge("a", "b");
        let result = bundle(&graph, &BundleConfig::default().with_cycles(1)).unwrap();
        assert_eq!(result.self_loops, 1);
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].input_index, 1);
    }
}
