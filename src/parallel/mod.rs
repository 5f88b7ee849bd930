//! Data-parallel execution mapping of the bundling algorithm
//!
//! Bundling state is stored in fixed-shape four-channel buffers, one row per
//! edge, and advanced by three passes in which every lane is independent:
//!
//! - **Compatibility** (once per run): one lane per edge writes the indices
//!   of its compatible edges into a capacity-limited slot block.
//! - **Subdivision** (once per cycle): one lane per point cell resamples the
//!   edge's polyline to the cycle's point count.
//! - **Update** (per iteration): one lane per point cell applies the spring
//!   and electrostatic forces.
//!
//! Point state lives in two buffers used alternately as source and target
//! ([`PingPong`]); no pass reads the buffer it writes. Edge counts above the
//! substrate's maximum extent are tiled into column blocks ([`TileLayout`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use fdeb::parallel::{CpuSubstrate, ParallelBundler};
//! use fdeb::{BundleConfig, PreparedGraph};
//!
//! let config = BundleConfig::default();
//! let mut substrate = CpuSubstrate::new();
//! let paths = ParallelBundler::new(&config, &mut substrate).run(&prepared)?;
//! ```

mod cpu;
mod lanes;
mod layout;
mod pingpong;
mod runner;
mod substrate;

pub use cpu::{CpuSubstrate, DEFAULT_MAX_EXTENT};
pub use lanes::{NO_EDGE, compatibility_lane, subdivision_lane, update_lane};
pub use layout::{Grid, GridView, MAX_EDGES, TileLayout};
pub use pingpong::PingPong;
pub use runner::ParallelBundler;
pub use substrate::{BufferId, CHANNELS, ComputeSubstrate, Kernel, KernelParams, Region};
