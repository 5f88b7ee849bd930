//! fdeb - Force-directed edge bundling for node-link graphs.
//!
//! Edges are modelled as flexible springs that attract compatible edges
//! electrostatically, then refined over several subdivision cycles into
//! smooth polylines. The crate provides a sequential reference solver and a
//! data-parallel mapping that runs the same rules as independent lanes on a
//! [`parallel::ComputeSubstrate`] (host memory, or wgpu with the `gpu`
//! feature).
//!
//! ```rust,ignore
//! use fdeb::{BundleConfig, Graph, Point, bundle};
//!
//! let graph = Graph::new()
//!     .with_node("a", Point::planar(0.0, 0.0))
//!     .with_node("b", Point::planar(100.0, 0.0))
//!     .with_edge("a", "b");
//! let bundled = bundle(&graph, &BundleConfig::default())?;
//! ```

pub mod bundler;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod forces;
pub mod geometry;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod graph;
pub mod io;
pub mod parallel;
pub mod schedule;
pub mod subdivision;

pub use bundler::{BundledEdge, BundledGraph, ForceBundler, bundle, bundle_with_substrate};
pub use config::{BundleConfig, OverflowPolicy, Strategy};
pub use error::{BundleError, BundleResult, SubstrateError, SubstrateResult};
pub use geometry::{EPSILON, Point};
pub use graph::{Edge, EdgeGeometry, Graph, Node, PreparedGraph};
pub use schedule::{Cycle, CycleSchedule, Phase};
