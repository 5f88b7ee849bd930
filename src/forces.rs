//! Force integrator: spring and electrostatic forces on subdivision points
//!
//! One iteration reads a frozen snapshot of every path and writes the
//! displaced points into a second set of paths, so the result does not depend
//! on the order in which edges are visited.

use crate::compatibility::CompatibilityLists;
use crate::geometry::Point;
use crate::graph::EdgeGeometry;

/// Spring constant for an edge: `K / (|edge| * (P + 1))`
pub fn spring_constant(stiffness: f64, edge_length: f64, subdivisions: usize) -> f64 {
    stiffness / (edge_length * (subdivisions + 1) as f64)
}

/// Pull toward both polyline neighbours
pub fn spring_force(prev: Point, current: Point, next: Point, kp: f64) -> Point {
    ((prev - current) + (next - current)) * kp
}

/// Inverse-distance attraction toward the matching point of each compatible
/// edge. Coincident points contribute nothing.
pub fn electrostatic_force(current: Point, others: impl IntoIterator<Item = Point>) -> Point {
    let mut sum = Point::ZERO;
    for other in others {
        if other.coincides(current) {
            continue;
        }
        let delta = other - current;
        sum += delta / delta.length();
    }
    sum
}

/// The neighbourhood of one subdivision point at the start of an iteration
#[derive(Debug, Clone, Copy)]
pub struct PointNeighborhood {
    pub prev: Point,
    pub current: Point,
    pub next: Point,
    /// Straight-line length of the owning edge (floored)
    pub edge_length: f64,
}

/// New position of a subdivision point after one iteration.
pub fn displaced_point(
    neighborhood: PointNeighborhood,
    subdivisions: usize,
    stiffness: f64,
    step_size: f64,
    others: impl IntoIterator<Item = Point>,
) -> Point {
    let PointNeighborhood {
        prev,
        current,
        next,
        edge_length,
    } = neighborhood;
    let kp = spring_constant(stiffness, edge_length, subdivisions);
    let force = spring_force(prev, current, next, kp) + electrostatic_force(current, others);
    current + force * step_size
}

/// Applies force iterations to the paths of one run.
pub struct ForceIntegrator<'a> {
    edges: &'a [EdgeGeometry],
    compatibility: &'a CompatibilityLists,
    stiffness: f64,
    scratch: Vec<Vec<Point>>,
}

impl<'a> ForceIntegrator<'a> {
    pub fn new(
        edges: &'a [EdgeGeometry],
        compatibility: &'a CompatibilityLists,
        stiffness: f64,
    ) -> Self {
        Self {
            edges,
            compatibility,
            stiffness,
            scratch: Vec::new(),
        }
    }

    /// Run one synchronous iteration over all interior points of all paths.
    ///
    /// Every path must have the same number of points. Endpoints are never
    /// moved.
    pub fn iterate(&mut self, paths: &mut [Vec<Point>], step_size: f64) {
        self.scratch.resize_with(paths.len(), Vec::new);
        for (snapshot, path) in self.scratch.iter_mut().zip(paths.iter()) {
            snapshot.clone_from(path);
        }

        let snapshot = &self.scratch;
        for (e, path) in paths.iter_mut().enumerate() {
            let current = &snapshot[e];
            let subdivisions = current.len().saturating_sub(2);
            let edge_length = self.edges[e].length();
            let neighbors = self.compatibility.neighbors(e);

            for i in 1..=subdivisions {
                let neighborhood = PointNeighborhood {
                    prev: current[i - 1],
                    current: current[i],
                    next: current[i + 1],
                    edge_length,
                };
                path[i] = displaced_point(
                    neighborhood,
                    subdivisions,
                    self.stiffness,
                    step_size,
                    neighbors.iter().map(|&oe| snapshot[oe][i]),
                );
            }
        }
    }
}
