//! GPU buffer types for the bundling kernels
//!
//! These types are uploaded directly to GPU buffers. All use f32/u32 for GPU
//! compatibility and are repr(C) for predictable layout.

use bytemuck::{Pod, Zeroable};

use crate::geometry::EPSILON;
use crate::parallel::KernelParams;

/// Workgroup edge length of every kernel (8 x 8 lanes)
pub const WORKGROUP_SIZE: u32 = 8;

/// Bytes per buffer cell (four f32 channels)
pub const CELL_BYTES: u64 = 16;

/// Kernel parameters passed to the GPU as uniforms.
///
/// Layout matches the WGSL `Params` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    pub edge_count: u32,
    pub rows: u32,
    pub tiles: u32,
    pub points_per_edge: u32,
    pub capacity: u32,
    pub subdivisions: u32,
    pub previous_subdivisions: u32,
    /// Padding for 16-byte alignment
    pub _padding: u32,
    pub stiffness: f32,
    pub step_size: f32,
    pub threshold: f32,
    /// Length floor and coincidence tolerance
    pub epsilon: f32,
}

impl From<&KernelParams> for KernelUniforms {
    fn from(params: &KernelParams) -> Self {
        Self {
            edge_count: params.edge_count,
            rows: params.rows,
            tiles: params.tiles,
            points_per_edge: params.points_per_edge,
            capacity: params.capacity,
            subdivisions: params.subdivisions,
            previous_subdivisions: params.previous_subdivisions,
            _padding: 0,
            stiffness: params.stiffness as f32,
            step_size: params.step_size as f32,
            threshold: params.threshold as f32,
            epsilon: EPSILON as f32,
        }
    }
}
