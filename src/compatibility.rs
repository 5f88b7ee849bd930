//! Edge compatibility scoring
//!
//! Two edges attract each other only if they are similar enough in angle,
//! length, position and mutual visibility. The product of the four scores is
//! compared against a threshold once per run to build a symmetric
//! neighbour list for every edge.

use crate::geometry::{EPSILON, Point};
use crate::graph::EdgeGeometry;

/// |cos θ| between the two edge directions
pub fn angle_compatibility(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    (p.vector().dot(q.vector()) / (p.length() * q.length())).abs()
}

/// Penalizes large differences in length
pub fn scale_compatibility(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    let (a, b) = (p.length(), q.length());
    let lavg = (a + b) / 2.0;
    2.0 / (lavg / a.min(b) + a.max(b) / lavg)
}

/// Penalizes edges whose midpoints are far apart relative to their length
pub fn position_compatibility(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    let lavg = (p.length() + q.length()) / 2.0;
    lavg / (lavg + p.midpoint().distance(q.midpoint()))
}

/// Orthogonal projection of `point` onto the infinite line through `line`
pub fn project_onto_line(point: Point, line: &EdgeGeometry) -> Point {
    let direction = line.vector();
    let denom = direction.length_squared().max(EPSILON * EPSILON);
    let r = (point - line.source).dot(direction) / denom;
    line.source + direction * r
}

/// How well `q` is seen from `p`: 1 when `q`'s projection onto `p`'s line is
/// centred on `p`'s midpoint, falling to 0 as it slides away.
pub fn edge_visibility(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    let i0 = project_onto_line(q.source, p);
    let i1 = project_onto_line(q.target, p);
    let mid_i = i0.midpoint(i1);
    let span = i0.distance(i1).max(EPSILON);
    (1.0 - 2.0 * p.midpoint().distance(mid_i) / span).max(0.0)
}

pub fn visibility_compatibility(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    edge_visibility(p, q).min(edge_visibility(q, p))
}

/// Product of the four compatibility measures
pub fn compatibility_score(p: &EdgeGeometry, q: &EdgeGeometry) -> f64 {
    angle_compatibility(p, q)
        * scale_compatibility(p, q)
        * position_compatibility(p, q)
        * visibility_compatibility(p, q)
}

/// Score of the pair `{a, b}`, always evaluated as (lower index, higher index).
///
/// Floating-point products are not commutative in the last bit, so fixing the
/// argument order keeps the relation exactly symmetric across strategies.
pub fn pair_score(edges: &[EdgeGeometry], a: usize, b: usize) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    compatibility_score(&edges[lo], &edges[hi])
}

pub fn are_compatible(edges: &[EdgeGeometry], a: usize, b: usize, threshold: f64) -> bool {
    a != b && pair_score(edges, a, b) >= threshold
}

/// Per-edge lists of compatible edge indices.
///
/// Built once per run and read-only afterwards. The relation is symmetric and
/// irreflexive; each list is sorted ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatibilityLists {
    lists: Vec<Vec<usize>>,
}

impl CompatibilityLists {
    /// Score every unordered pair of distinct edges.
    pub fn compute(edges: &[EdgeGeometry], threshold: f64) -> Self {
        let mut lists = vec![Vec::new(); edges.len()];
        for e in 0..edges.len() {
            for oe in (e + 1)..edges.len() {
                if are_compatible(edges, e, oe, threshold) {
                    lists[e].push(oe);
                    lists[oe].push(e);
                }
            }
        }
        // lists[oe] received lower indices first, then higher ones: already sorted
        let pairs: usize = lists.iter().map(Vec::len).sum::<usize>() / 2;
        tracing::debug!(edges = edges.len(), pairs, "computed compatibility lists");
        Self { lists }
    }

    pub fn neighbors(&self, edge: usize) -> &[usize] {
        &self.lists[edge]
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Largest neighbour count of any edge
    pub fn max_degree(&self) -> usize {
        self.lists.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.lists.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(x0: f64, y0: f64, x1: f64, y1: f64) -> EdgeGeometry {
        EdgeGeometry::new(Point::planar(x0, y0), Point::planar(x1, y1))
    }

    #[test]
    fn test_identical_edges_fully_compatible() {
        let e = edge(0.0, 0.0, 10.0, 0.0);
        assert!((compatibility_score(&e, &e) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_ignores_direction() {
        let p = edge(0.0, 0.0, 10.0, 0.0);
        let q = edge(10.0, 1.0, 0.0, 1.0);
        assert!((angle_compatibility(&p, &q) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_perpendicular_edges_incompatible() {
        let p = edge(0.0, 0.0, 10.0, 0.0);
        let q = edge(5.0, -5.0, 5.0, 5.0);
        assert!(angle_compatibility(&p, &q) < 1e-12);
        assert!(compatibility_score(&p, &q) < 1e-12);
    }

    #[test]
    fn test_scale_penalizes_length_mismatch() {
        let p = edge(0.0, 0.0, 10.0, 0.0);
        let q = edge(0.0, 1.0, 1.0, 1.0);
        let same = scale_compatibility(&p, &p);
        assert!((same - 1.0).abs() < 1e-12);
        assert!(scale_compatibility(&p, &q) < 0.5);
    }

    #[test]
    fn test_position_penalizes_distance() {
        let p = edge(0.0, 0.0, 10.0, 0.0);
        let near = edge(0.0, 1.0, 10.0, 1.0);
        let far = edge(0.0, 100.0, 10.0, 100.0);
        assert!(position_compatibility(&p, &near) > position_compatibility(&p, &far));
    }

    #[test]
    fn test_visibility_of_shifted_edge() {
        let p = edge(0.0, 0.0, 10.0, 0.0);
        // Projection lies entirely beyond p's end
        let q = edge(20.0, 1.0, 30.0, 1.0);
        assert_eq!(visibility_compatibility(&p, &q), 0.0);
        let aligned = edge(0.0, 1.0, 10.0, 1.0);
        assert!((visibility_compatibility(&p, &aligned) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_onto_line() {
        let line = edge(0.0, 0.0, 10.0, 0.0);
        let projected = project_onto_line(Point::planar(3.0, 7.0), &line);
        assert_eq!(projected, Point::planar(3.0, 0.0));
    }

    #[test]
    fn test_lists_symmetric_and_irreflexive() {
        let edges = vec![
            edge(0.0, 0.0, 10.0, 0.0),
            edge(0.0, 1.0, 10.0, 1.0),
            edge(0.0, 2.0, 10.0, 2.0),
            edge(5.0, -5.0, 5.0, 5.0),
        ];
        let lists = CompatibilityLists::compute(&edges, 0.6);

        for (i, list) in lists.iter().enumerate() {
            assert!(!list.contains(&i));
            for &j in list {
                assert!(lists.neighbors(j).contains(&i));
            }
        }
        assert_eq!(lists.neighbors(0), &[1, 2]);
        assert!(lists.neighbors(3).is_empty());
        assert_eq!(lists.max_degree(), 2);
    }

    #[test]
    fn test_unreachable_threshold_gives_empty_lists() {
        let edges = vec![edge(0.0, 0.0, 10.0, 0.0), edge(0.0, 0.0, 10.0, 0.0001)];
        let lists = CompatibilityLists::compute(&edges, 1.0 + 1e-9);
        assert_eq!(lists.max_degree(), 0);
    }
}
