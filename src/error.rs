//! Error types for bundling runs and compute substrates

use thiserror::Error;

/// Errors surfaced by a bundling run.
///
/// A run that returns an error produces no output; there is no partial
/// bundling result.
#[derive(Error, Debug)]
pub enum BundleError {
    /// A configuration value is out of range
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// An edge references a node id that is not in the node list
    #[error("edge references unknown node: {id}")]
    UnknownNode { id: String },

    /// The buffer layout does not fit the substrate even after tiling
    #[error("problem too large: needs a buffer extent of {required}, substrate allows {max_extent}")]
    ProblemTooLarge { required: u64, max_extent: u32 },

    /// An edge has more compatible edges than the per-edge capacity allows
    #[error("edge {edge} has {count} compatible edges, capacity is {capacity}")]
    CompatibilityOverflow {
        edge: usize,
        count: usize,
        capacity: u32,
    },

    /// The execution substrate failed
    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),
}

/// Errors raised by a compute substrate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubstrateError {
    #[error("unknown buffer {0}")]
    UnknownBuffer(usize),

    #[error("no target buffer bound")]
    TargetNotBound,

    /// The bound target cannot be written (wrong shape or already released)
    #[error("target buffer {buffer} is not ready for writes: {reason}")]
    TargetNotReady { buffer: usize, reason: String },

    #[error("kernel `{0}` is not compiled")]
    KernelNotCompiled(&'static str),

    /// A dispatch would read the buffer it is writing
    #[error("buffer {0} is both an input and the bound target")]
    Aliasing(usize),

    #[error("kernel `{kernel}` expects {expected} input buffers, got {actual}")]
    InputCount {
        kernel: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("region {x},{y} {width}x{height} is outside a {buffer_width}x{buffer_height} buffer")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        buffer_width: u32,
        buffer_height: u32,
    },

    #[error("allocation of {width}x{height} exceeds substrate limits")]
    AllocationTooLarge { width: u32, height: u32 },

    #[error("no suitable compute adapter found")]
    NoAdapter,

    #[error("device error: {0}")]
    Device(String),

    #[error("readback failed: {0}")]
    Readback(String),
}

/// Result type for bundling runs
pub type BundleResult<T> = Result<T, BundleError>;

/// Result type for substrate operations
pub type SubstrateResult<T> = Result<T, SubstrateError>;
