//! Host-memory reference substrate
//!
//! Runs every lane of a dispatch on the calling thread. Lanes only read the
//! input buffers and the result is assembled into the bound target, so the
//! outcome is the same as if all lanes ran at once.

use crate::error::{SubstrateError, SubstrateResult};
use crate::parallel::lanes::{compatibility_lane, subdivision_lane, update_lane};
use crate::parallel::layout::Grid;
use crate::parallel::substrate::{
    BufferId, CHANNELS, ComputeSubstrate, Kernel, KernelParams, Region,
};

/// Default maximum buffer extent, matching common GPU 2D texture limits
pub const DEFAULT_MAX_EXTENT: u32 = 8192;

/// A [`ComputeSubstrate`] backed by host memory.
#[derive(Debug)]
pub struct CpuSubstrate {
    max_extent: u32,
    buffers: Vec<Option<Grid>>,
    target: Option<BufferId>,
    compiled: [bool; 3],
}

impl Default for CpuSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSubstrate {
    pub fn new() -> Self {
        Self::with_max_extent(DEFAULT_MAX_EXTENT)
    }

    pub fn with_max_extent(max_extent: u32) -> Self {
        Self {
            max_extent,
            buffers: Vec::new(),
            target: None,
            compiled: [false; 3],
        }
    }

    /// Buffers currently allocated
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn grid(&self, buffer: BufferId) -> SubstrateResult<&Grid> {
        self.buffers
            .get(buffer.0)
            .and_then(Option::as_ref)
            .ok_or(SubstrateError::UnknownBuffer(buffer.0))
    }

    fn grid_mut(&mut self, buffer: BufferId) -> SubstrateResult<&mut Grid> {
        self.buffers
            .get_mut(buffer.0)
            .and_then(Option::as_mut)
            .ok_or(SubstrateError::UnknownBuffer(buffer.0))
    }
}

impl ComputeSubstrate for CpuSubstrate {
    fn max_extent(&self) -> u32 {
        self.max_extent
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        contents: Option<&[f32]>,
    ) -> SubstrateResult<BufferId> {
        if width == 0 || height == 0 || width > self.max_extent || height > self.max_extent {
            return Err(SubstrateError::AllocationTooLarge { width, height });
        }
        let mut grid = Grid::zeroed(width, height);
        if let Some(contents) = contents {
            if contents.len() != grid.data.len() {
                return Err(SubstrateError::ShapeMismatch {
                    expected: grid.data.len(),
                    actual: contents.len(),
                });
            }
            grid.data.copy_from_slice(contents);
        }

        // Reuse a released slot when one is free
        let id = match self.buffers.iter().position(Option::is_none) {
            Some(free) => {
                self.buffers[free] = Some(grid);
                free
            }
            None => {
                self.buffers.push(Some(grid));
                self.buffers.len() - 1
            }
        };
        Ok(BufferId(id))
    }

    fn write_region(
        &mut self,
        buffer: BufferId,
        region: Region,
        data: &[f32],
    ) -> SubstrateResult<()> {
        let grid = self.grid_mut(buffer)?;
        if !region.fits(grid.width, grid.height) {
            return Err(SubstrateError::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                buffer_width: grid.width,
                buffer_height: grid.height,
            });
        }
        if data.len() != region.len() {
            return Err(SubstrateError::ShapeMismatch {
                expected: region.len(),
                actual: data.len(),
            });
        }

        let row_len = region.width as usize * CHANNELS;
        for (row, chunk) in data.chunks_exact(row_len.max(1)).enumerate() {
            let start = ((region.y as usize + row) * grid.width as usize + region.x as usize)
                * CHANNELS;
            grid.data[start..start + row_len].copy_from_slice(chunk);
        }
        Ok(())
    }

    fn bind_target(&mut self, buffer: BufferId) -> SubstrateResult<()> {
        self.grid(buffer)?;
        self.target = Some(buffer);
        Ok(())
    }

    fn compile(&mut self, kernel: Kernel) -> SubstrateResult<()> {
        self.compiled[kernel.index()] = true;
        Ok(())
    }

    fn is_compiled(&self, kernel: Kernel) -> bool {
        self.compiled[kernel.index()]
    }

    fn dispatch(
        &mut self,
        kernel: Kernel,
        params: &KernelParams,
        inputs: &[BufferId],
    ) -> SubstrateResult<()> {
        if !self.is_compiled(kernel) {
            return Err(SubstrateError::KernelNotCompiled(kernel.name()));
        }
        if inputs.len() != kernel.input_count() {
            return Err(SubstrateError::InputCount {
                kernel: kernel.name(),
                expected: kernel.input_count(),
                actual: inputs.len(),
            });
        }
        let target = self.target.ok_or(SubstrateError::TargetNotBound)?;
        if inputs.contains(&target) {
            return Err(SubstrateError::Aliasing(target.0));
        }

        let expected = (kernel.block_width(params) * params.tiles, params.rows);
        let mut output = self
            .buffers
            .get_mut(target.0)
            .and_then(Option::take)
            .ok_or(SubstrateError::UnknownBuffer(target.0))?;
        if (output.width, output.height) != expected {
            let reason = format!(
                "{} writes {}x{} cells, buffer is {}x{}",
                kernel.name(),
                expected.0,
                expected.1,
                output.width,
                output.height
            );
            self.buffers[target.0] = Some(output);
            return Err(SubstrateError::TargetNotReady {
                buffer: target.0,
                reason,
            });
        }

        let result = run_lanes(self, kernel, params, inputs, &mut output);
        self.buffers[target.0] = Some(output);
        result
    }

    fn read_back(&mut self, buffer: BufferId) -> SubstrateResult<Vec<f32>> {
        Ok(self.grid(buffer)?.data.clone())
    }

    fn release(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0) {
            *slot = None;
        }
        if self.target == Some(buffer) {
            self.target = None;
        }
    }

    fn release_kernels(&mut self) {
        self.compiled = [false; 3];
    }
}

fn run_lanes(
    substrate: &CpuSubstrate,
    kernel: Kernel,
    params: &KernelParams,
    inputs: &[BufferId],
    output: &mut Grid,
) -> SubstrateResult<()> {
    let points = substrate.grid(inputs[0])?.view();
    let (width, height) = kernel.domain(params);

    match kernel {
        Kernel::Compatibility => {
            for row in 0..height {
                for tile in 0..width {
                    let slots = compatibility_lane(&points, params, tile, row);
                    for (slot, texel) in slots.into_iter().enumerate() {
                        output.set(tile * params.capacity + slot as u32, row, texel);
                    }
                }
            }
        }
        Kernel::Subdivision => {
            for y in 0..height {
                for x in 0..width {
                    output.set(x, y, subdivision_lane(&points, params, x, y));
                }
            }
        }
        Kernel::Update => {
            let compatibility = substrate.grid(inputs[1])?.view();
            for y in 0..height {
                for x in 0..width {
                    output.set(x, y, update_lane(&points, &compatibility, params, x, y));
                }
            }
        }
    }
    Ok(())
}
