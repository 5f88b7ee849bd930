//! Input graph model and preparation for bundling
//!
//! Node positions are read-only inputs. [`PreparedGraph`] copies each edge's
//! endpoint positions into solver-owned storage, so a run can never write
//! back into caller data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, BundleResult};
use crate::geometry::Point;

/// A positioned node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub position: Point,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Point) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

/// A directed edge between two node ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Nodes plus edges, as handed to the bundler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node (builder style)
    pub fn with_node(mut self, id: impl Into<String>, position: Point) -> Self {
        self.nodes.push(Node::new(id, position));
        self
    }

    /// Add an edge (builder style)
    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }
}

/// Endpoint positions of one bundled edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeGeometry {
    pub source: Point,
    pub target: Point,
}

impl EdgeGeometry {
    pub fn new(source: Point, target: Point) -> Self {
        Self { source, target }
    }

    /// Direction vector, source to target
    pub fn vector(&self) -> Point {
        self.target - self.source
    }

    /// Straight-line length, floored at [`crate::geometry::EPSILON`]
    pub fn length(&self) -> f64 {
        self.source
            .distance(self.target)
            .max(crate::geometry::EPSILON)
    }

    pub fn midpoint(&self) -> Point {
        self.source.midpoint(self.target)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Edges resolved to positions with self-loops removed.
#[derive(Debug, Clone, Default)]
pub struct PreparedGraph {
    /// Geometry of every edge that takes part in bundling
    pub edges: Vec<EdgeGeometry>,
    /// For each prepared edge, the index of the input edge it came from
    pub input_indices: Vec<usize>,
    /// Number of input edges dropped as self-loops
    pub self_loops: usize,
}

impl PreparedGraph {
    /// Resolve node ids and drop edges whose endpoints share a position.
    pub fn from_graph(graph: &Graph) -> BundleResult<Self> {
        let positions: HashMap<&str, Point> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.position))
            .collect();

        let lookup = |id: &str| {
            positions
                .get(id)
                .copied()
                .ok_or_else(|| BundleError::UnknownNode { id: id.to_string() })
        };

        let mut prepared = PreparedGraph::default();
        for (index, edge) in graph.edges.iter().enumerate() {
            let geometry = EdgeGeometry::new(lookup(&edge.source)?, lookup(&edge.target)?);
            if geometry.is_self_loop() {
                prepared.self_loops += 1;
                continue;
            }
            prepared.edges.push(geometry);
            prepared.input_indices.push(index);
        }

        if prepared.self_loops > 0 {
            tracing::warn!(
                dropped = prepared.self_loops,
                "dropping self-loop edges before bundling"
            );
        }

        Ok(prepared)
    }

    /// Build directly from endpoint geometry (self-loops still filtered)
    pub fn from_segments(segments: impl IntoIterator<Item = (Point, Point)>) -> Self {
        let mut prepared = PreparedGraph::default();
        for (index, (source, target)) in segments.into_iter().enumerate() {
            let geometry = EdgeGeometry::new(source, target);
            if geometry.is_self_loop() {
                prepared.self_loops += 1;
                continue;
            }
            prepared.edges.push(geometry);
            prepared.input_indices.push(index);
        }
        prepared
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Graph {
        Graph::new()
            .with_node("a", Point::planar(0.0, 0.0))
            .with_node("b", Point::planar(10.0, 0.0))
            .with_node("c", Point::planar(10.0, 10.0))
            .with_node("d", Point::planar(10.0, 10.0))
    }

    #[test]
    fn test_prepare_resolves_positions() {
        let graph = square().with_edge("a", "b").with_edge("b", "c");
        let prepared = PreparedGraph::from_graph(&graph).unwrap();

        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared.edges[0].target, Point::planar(10.0, 0.0));
        assert_eq!(prepared.input_indices, vec![0, 1]);
    }

    #[test]
    fn test_prepare_drops_self_loops() {
        // c and d are distinct nodes at the same position
        let graph = square()
            .with_edge("a", "a")
            .with_edge("a", "b")
            .with_edge("c", "d");
        let prepared = PreparedGraph::from_graph(&graph).unwrap();

        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared.self_loops, 2);
        assert_eq!(prepared.input_indices, vec![1]);
    }

    #[test]
    fn test_prepare_unknown_node() {
        let graph = square().with_edge("a", "zzz");
        let err = PreparedGraph::from_graph(&graph).unwrap_err();
        assert!(matches!(err, BundleError::UnknownNode { id } if id == "zzz"));
    }

    #[test]
    fn test_edge_length_has_floor() {
        let edge = EdgeGeometry::new(Point::planar(1.0, 1.0), Point::planar(1.0, 1.0));
        assert!(edge.length() > 0.0);
    }

    #[test]
    fn test_node_deserializes_without_z() {
        let node: Node = serde_json::from_str(r#"{"id": "n", "x": 1.5, "y": -2.0}"#).unwrap();
        assert_eq!(node.position, Point::planar(1.5, -2.0));
    }
}
