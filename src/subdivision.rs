//! Subdivision engine: per-edge polylines and arc-length resampling
//!
//! Every edge is approximated by `P + 2` points: the fixed source, `P`
//! movable subdivision points, and the fixed target. Between cycles the
//! polyline is re-parameterized so that the new points sit at uniform arc
//! length along the current (bent) path.

use crate::geometry::Point;
use crate::graph::EdgeGeometry;

/// Total length of a polyline
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Walks a polyline by arc length.
///
/// Targets passed to [`ArcWalker::advance`] must be non-decreasing. Starting a
/// fresh walker for a single target gives the same result as reaching that
/// target from a walker that was advanced through earlier targets.
pub struct ArcWalker<'a> {
    points: &'a [Point],
    segment: usize,
    walked: f64,
}

impl<'a> ArcWalker<'a> {
    pub fn new(points: &'a [Point]) -> Self {
        Self {
            points,
            segment: 1,
            walked: 0.0,
        }
    }

    /// The point at arc length `target` from the first point
    pub fn advance(&mut self, target: f64) -> Point {
        while self.segment < self.points.len() {
            let start = self.points[self.segment - 1];
            let end = self.points[self.segment];
            let length = start.distance(end);
            if length > 0.0 && self.walked + length >= target {
                return start.lerp(end, (target - self.walked) / length);
            }
            self.walked += length;
            self.segment += 1;
        }
        self.points.last().copied().unwrap_or_default()
    }
}

/// Point `index` of `points` resampled to `subdivisions` interior points.
///
/// Index 0 and `subdivisions + 1` return the original endpoints unchanged.
/// The parallel subdivision pass evaluates each output point this way.
pub fn resampled_point(points: &[Point], subdivisions: usize, index: usize) -> Point {
    let last = points.len() - 1;
    if index == 0 {
        return points[0];
    }
    if index > subdivisions {
        return points[last];
    }
    let segment = polyline_length(points) / (subdivisions + 1) as f64;
    ArcWalker::new(points).advance(segment * index as f64)
}

/// Resample a polyline to `subdivisions` interior points at uniform arc length.
///
/// Old segments may straddle several new segment boundaries; the walk carries
/// the remaining length from one old segment into the next. Endpoints are
/// copied exactly.
pub fn resample(points: &[Point], subdivisions: usize) -> Vec<Point> {
    let last = points.len() - 1;
    let segment = polyline_length(points) / (subdivisions + 1) as f64;

    let mut resampled = Vec::with_capacity(subdivisions + 2);
    resampled.push(points[0]);
    let mut walker = ArcWalker::new(points);
    for index in 1..=subdivisions {
        resampled.push(walker.advance(segment * index as f64));
    }
    resampled.push(points[last]);
    resampled
}

/// Per-edge subdivision paths owned by a bundling run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubdivisionPaths {
    paths: Vec<Vec<Point>>,
    subdivisions: usize,
}

impl SubdivisionPaths {
    /// Straight `[source, target]` paths with no interior points
    pub fn new(edges: &[EdgeGeometry]) -> Self {
        Self {
            paths: edges.iter().map(|e| vec![e.source, e.target]).collect(),
            subdivisions: 0,
        }
    }

    /// Re-parameterize every path to `subdivisions` interior points.
    pub fn subdivide(&mut self, subdivisions: usize) {
        for path in &mut self.paths {
            *path = resample(path, subdivisions);
        }
        self.subdivisions = subdivisions;
    }

    /// Current interior point count per edge
    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    pub fn paths(&self) -> &[Vec<Point>] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut [Vec<Point>] {
        &mut self.paths
    }

    pub fn into_paths(self) -> Vec<Vec<Point>> {
        self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn test_first_subdivision_is_midpoint() {
        let path = vec![Point::planar(0.0, 0.0), Point::planar(10.0, 4.0)];
        let resampled = resample(&path, 1);
        assert_eq!(resampled.len(), 3);
        assert!(approx_eq(resampled[1], Point::planar(5.0, 2.0)));
    }

    #[test]
    fn test_resample_preserves_endpoints_exactly() {
        let source = Point::new(0.1, 0.2, 0.3);
        let target = Point::new(9.7, -3.3, 1.1);
        let path = vec![source, Point::new(4.0, 5.0, 0.0), target];
        let resampled = resample(&path, 7);
        assert_eq!(resampled.len(), 9);
        assert_eq!(resampled[0], source);
        assert_eq!(resampled[8], target);
    }

    #[test]
    fn test_resample_uniform_arc_length() {
        // L-shaped path of length 20; 3 interior points at arc 5, 10, 15
        let path = vec![
            Point::planar(0.0, 0.0),
            Point::planar(10.0, 0.0),
            Point::planar(10.0, 10.0),
        ];
        let resampled = resample(&path, 3);
        assert!(approx_eq(resampled[1], Point::planar(5.0, 0.0)));
        assert!(approx_eq(resampled[2], Point::planar(10.0, 0.0)));
        assert!(approx_eq(resampled[3], Point::planar(10.0, 5.0)));
    }

    #[test]
    fn test_old_segment_straddles_several_new_segments() {
        // One long segment followed by a short one
        let path = vec![
            Point::planar(0.0, 0.0),
            Point::planar(9.0, 0.0),
            Point::planar(9.0, 1.0),
        ];
        let resampled = resample(&path, 4);
        for (i, expected) in [2.0, 4.0, 6.0, 8.0].into_iter().enumerate() {
            assert!(approx_eq(resampled[i + 1], Point::planar(expected, 0.0)));
        }
    }

    #[test]
    fn test_pointwise_matches_walk() {
        let path = vec![
            Point::planar(0.0, 0.0),
            Point::planar(3.0, 1.0),
            Point::planar(4.0, 7.0),
            Point::planar(12.0, 7.5),
        ];
        let walked = resample(&path, 8);
        for (j, point) in walked.iter().enumerate() {
            assert_eq!(*point, resampled_point(&path, 8, j));
        }
    }

    #[test]
    fn test_paths_subdivide_counts() {
        let edges = vec![EdgeGeometry::new(
            Point::planar(0.0, 0.0),
            Point::planar(1.0, 0.0),
        )];
        let mut paths = SubdivisionPaths::new(&edges);
        paths.subdivide(1);
        paths.subdivide(2);
        paths.subdivide(4);
        assert_eq!(paths.subdivisions(), 4);
        assert_eq!(paths.paths()[0].len(), 6);
    }
}
