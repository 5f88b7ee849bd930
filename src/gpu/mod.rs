//! GPU compute substrate for the parallel bundling passes
//!
//! [`WgpuSubstrate`] implements [`ComputeSubstrate`](crate::parallel::ComputeSubstrate)
//! with wgpu compute pipelines, one WGSL module per kernel. Point and
//! compatibility state live in storage buffers laid out as row-major 2D
//! grids of four f32 channels, the same layout the host substrate uses.
//!
//! # Example
//!
//! ```rust,ignore
//! use fdeb::gpu::WgpuSubstrate;
//! use fdeb::{BundleConfig, Strategy, bundle_with_substrate};
//!
//! let mut substrate = WgpuSubstrate::new()?;
//! let config = BundleConfig::default().with_strategy(Strategy::Parallel);
//! let bundled = bundle_with_substrate(&graph, &config, &mut substrate)?;
//! ```
//!
//! # Precision
//!
//! Kernels compute in f32. Bundled endpoints are restored from the f64
//! inputs after readback; interior points agree with the sequential solver
//! up to f32 rounding.

mod shaders;
mod substrate;
mod types;

pub use shaders::kernel_source;
pub use substrate::WgpuSubstrate;
pub use types::{CELL_BYTES, KernelUniforms, WORKGROUP_SIZE};
