//! The execution substrate interface required by the parallel mapping
//!
//! A substrate owns 2D four-channel f32 buffers and compiled kernels. The
//! bundler only allocates, fills, binds, dispatches, reads back and releases;
//! how lanes are scheduled is up to the substrate.

use crate::error::SubstrateResult;

/// Channels per buffer cell: x, y, z and one reserved channel
pub const CHANNELS: usize = 4;

/// Handle to a buffer owned by a substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// A rectangular sub-region of a buffer, in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of f32 values covered by the region
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// The three data-parallel passes of the bundling algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// One lane per edge; writes the edge's compatible-edge indices
    Compatibility,
    /// One lane per point cell; resamples the polyline to a new point count
    Subdivision,
    /// One lane per point cell; applies one force iteration
    Update,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::Compatibility, Kernel::Subdivision, Kernel::Update];

    /// Kernel name, also the shader entry point
    pub fn name(self) -> &'static str {
        match self {
            Kernel::Compatibility => "compatibility",
            Kernel::Subdivision => "subdivision",
            Kernel::Update => "update",
        }
    }

    /// Number of input buffers the kernel reads
    pub fn input_count(self) -> usize {
        match self {
            Kernel::Compatibility | Kernel::Subdivision => 1,
            Kernel::Update => 2,
        }
    }

    /// Column-block width of the buffer this kernel writes
    pub fn block_width(self, params: &KernelParams) -> u32 {
        match self {
            Kernel::Compatibility => params.capacity,
            Kernel::Subdivision | Kernel::Update => params.points_per_edge,
        }
    }

    /// Lane grid `(width, height)` of one dispatch
    pub fn domain(self, params: &KernelParams) -> (u32, u32) {
        match self {
            Kernel::Compatibility => (params.tiles, params.rows),
            Kernel::Subdivision | Kernel::Update => {
                (params.points_per_edge * params.tiles, params.rows)
            }
        }
    }

    pub fn index(self) -> usize {
        match self {
            Kernel::Compatibility => 0,
            Kernel::Subdivision => 1,
            Kernel::Update => 2,
        }
    }
}

/// Scalar parameters passed to every kernel dispatch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub edge_count: u32,
    /// Rows per tile (edges per column block)
    pub rows: u32,
    /// Number of column blocks
    pub tiles: u32,
    /// Columns per edge in the point buffers
    pub points_per_edge: u32,
    /// Columns per edge in the compatibility buffer
    pub capacity: u32,
    /// Interior point count being produced or iterated
    pub subdivisions: u32,
    /// Interior point count held by the input buffer (subdivision pass)
    pub previous_subdivisions: u32,
    pub stiffness: f64,
    pub step_size: f64,
    pub threshold: f64,
}

/// A compute substrate: buffer storage plus compiled kernels.
///
/// Dispatches write into the currently bound target and must never read it;
/// implementations reject a dispatch whose inputs include the target.
pub trait ComputeSubstrate {
    /// Largest width or height a buffer may have
    fn max_extent(&self) -> u32;

    /// Allocate a `width x height` buffer, zeroed or filled from `contents`
    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        contents: Option<&[f32]>,
    ) -> SubstrateResult<BufferId>;

    /// Overwrite a sub-region of an existing buffer
    fn write_region(&mut self, buffer: BufferId, region: Region, data: &[f32])
    -> SubstrateResult<()>;

    /// Make `buffer` the target of the next dispatches and check it is writable
    fn bind_target(&mut self, buffer: BufferId) -> SubstrateResult<()>;

    fn compile(&mut self, kernel: Kernel) -> SubstrateResult<()>;

    fn is_compiled(&self, kernel: Kernel) -> bool;

    /// Run `kernel` over its domain, reading `inputs` and writing the bound target
    fn dispatch(
        &mut self,
        kernel: Kernel,
        params: &KernelParams,
        inputs: &[BufferId],
    ) -> SubstrateResult<()>;

    /// Copy a buffer's contents into host memory, row-major
    fn read_back(&mut self, buffer: BufferId) -> SubstrateResult<Vec<f32>>;

    /// Free a buffer; unknown ids are ignored
    fn release(&mut self, buffer: BufferId);

    /// Drop every compiled kernel
    fn release_kernels(&mut self);
}
