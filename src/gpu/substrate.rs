//! wgpu-backed compute substrate
//!
//! Buffers are storage buffers holding `width * height` four-channel f32
//! cells in row-major order. Each dispatch writes the kernel uniforms,
//! builds a bind group for the inputs and the bound target, and submits one
//! compute pass.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::shaders::kernel_source;
use super::types::{CELL_BYTES, KernelUniforms, WORKGROUP_SIZE};
use crate::error::{SubstrateError, SubstrateResult};
use crate::parallel::{BufferId, CHANNELS, ComputeSubstrate, Kernel, KernelParams, Region};

struct GpuGrid {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl GpuGrid {
    fn bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * CELL_BYTES
    }
}

struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// A [`ComputeSubstrate`] running the kernels as WGSL compute shaders.
pub struct WgpuSubstrate {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    buffers: Vec<Option<GpuGrid>>,
    target: Option<BufferId>,
    kernels: [Option<CompiledKernel>; 3],
    uniform_buffer: wgpu::Buffer,
}

impl WgpuSubstrate {
    /// Create a substrate on the default high-performance adapter
    pub fn new() -> SubstrateResult<Self> {
        let (device, queue) = pollster::block_on(Self::create_device())?;
        Ok(Self::with_device(Arc::new(device), Arc::new(queue)))
    }

    /// Create a substrate using an existing device and queue
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Uniform Buffer"),
            contents: bytemuck::bytes_of(&KernelUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            device,
            queue,
            buffers: Vec::new(),
            target: None,
            kernels: [None, None, None],
            uniform_buffer,
        }
    }

    async fn create_device() -> SubstrateResult<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SubstrateError::NoAdapter)?;

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Edge Bundling Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None, // trace path
            )
            .await
            .map_err(|e| SubstrateError::Device(e.to_string()))
    }

    /// Buffers currently allocated
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    fn grid(&self, buffer: BufferId) -> SubstrateResult<&GpuGrid> {
        self.buffers
            .get(buffer.0)
            .and_then(Option::as_ref)
            .ok_or(SubstrateError::UnknownBuffer(buffer.0))
    }

    /// Run `f` inside a validation error scope, surfacing the first error.
    fn scoped<T>(&self, f: impl FnOnce(&Self) -> T) -> SubstrateResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(self);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(SubstrateError::Device(err.to_string())),
            None => Ok(value),
        }
    }

    fn create_bind_group_layout(&self, kernel: Kernel) -> wgpu::BindGroupLayout {
        let mut entries = vec![
            layout_entry(0, wgpu::BufferBindingType::Uniform),
            layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
            layout_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
        ];
        if kernel == Kernel::Update {
            entries.push(layout_entry(
                3,
                wgpu::BufferBindingType::Storage { read_only: true },
            ));
        }

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kernel.name()),
                entries: &entries,
            })
    }
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ComputeSubstrate for WgpuSubstrate {
    fn max_extent(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        contents: Option<&[f32]>,
    ) -> SubstrateResult<BufferId> {
        let limits = self.device.limits();
        let size = width as u64 * height as u64 * CELL_BYTES;
        if width == 0
            || height == 0
            || width > limits.max_texture_dimension_2d
            || height > limits.max_texture_dimension_2d
            || size > limits.max_storage_buffer_binding_size as u64
            || size > limits.max_buffer_size
        {
            return Err(SubstrateError::AllocationTooLarge { width, height });
        }

        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let buffer = match contents {
            Some(contents) => {
                let expected = width as usize * height as usize * CHANNELS;
                if contents.len() != expected {
                    return Err(SubstrateError::ShapeMismatch {
                        expected,
                        actual: contents.len(),
                    });
                }
                self.scoped(|s| {
                    s.device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("Grid Buffer"),
                            contents: bytemuck::cast_slice(contents),
                            usage,
                        })
                })?
            }
            // New buffers are zero-initialized by wgpu
            None => self.scoped(|s| {
                s.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Grid Buffer"),
                    size,
                    usage,
                    mapped_at_creation: false,
                })
            })?,
        };

        let grid = GpuGrid {
            buffer,
            width,
            height,
        };
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
        let grid = self.grid(buffer)?;
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
        if region.is_empty() {
            return Ok(());
        }

        let row_len = region.width as usize * CHANNELS;
        for (row, chunk) in data.chunks_exact(row_len).enumerate() {
            let offset = ((region.y as u64 + row as u64) * grid.width as u64 + region.x as u64)
                * CELL_BYTES;
            self.queue
                .write_buffer(&grid.buffer, offset, bytemuck::cast_slice(chunk));
        }
        Ok(())
    }

    fn bind_target(&mut self, buffer: BufferId) -> SubstrateResult<()> {
        self.grid(buffer)?;
        self.target = Some(buffer);
        Ok(())
    }

    fn compile(&mut self, kernel: Kernel) -> SubstrateResult<()> {
        let compiled = self.scoped(|s| {
            let module = s
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(kernel.name()),
                    source: wgpu::ShaderSource::Wgsl(kernel_source(kernel).into()),
                });
            let bind_group_layout = s.create_bind_group_layout(kernel);
            let pipeline_layout =
                s.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(kernel.name()),
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    });
            let pipeline = s
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(kernel.name()),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(kernel.name()),
                    compilation_options: Default::default(),
                    cache: None,
                });
            CompiledKernel {
                pipeline,
                bind_group_layout,
            }
        })?;

        tracing::debug!(kernel = kernel.name(), "compiled compute kernel");
        self.kernels[kernel.index()] = Some(compiled);
        Ok(())
    }

    fn is_compiled(&self, kernel: Kernel) -> bool {
        self.kernels[kernel.index()].is_some()
    }

    fn dispatch(
        &mut self,
        kernel: Kernel,
        params: &KernelParams,
        inputs: &[BufferId],
    ) -> SubstrateResult<()> {
        let compiled = self.kernels[kernel.index()]
            .as_ref()
            .ok_or(SubstrateError::KernelNotCompiled(kernel.name()))?;
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

        let output = self.grid(target)?;
        let expected = (kernel.block_width(params) * params.tiles, params.rows);
        if (output.width, output.height) != expected {
            return Err(SubstrateError::TargetNotReady {
                buffer: target.0,
                reason: format!(
                    "{} writes {}x{} cells, buffer is {}x{}",
                    kernel.name(),
                    expected.0,
                    expected.1,
                    output.width,
                    output.height
                ),
            });
        }
        let input_grids = inputs
            .iter()
            .map(|&id| self.grid(id))
            .collect::<SubstrateResult<Vec<_>>>()?;

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&KernelUniforms::from(params)),
        );

        let (width, height) = kernel.domain(params);
        self.scoped(|s| {
            let mut entries = vec![
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: s.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: input_grids[0].buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output.buffer.as_entire_binding(),
                },
            ];
            if let Some(compatibility) = input_grids.get(1) {
                entries.push(wgpu::BindGroupEntry {
                    binding: 3,
                    resource: compatibility.buffer.as_entire_binding(),
                });
            }
            let bind_group = s.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel.name()),
                layout: &compiled.bind_group_layout,
                entries: &entries,
            });

            let mut encoder = s
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Bundling Encoder"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel.name()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&compiled.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(
                    width.div_ceil(WORKGROUP_SIZE).max(1),
                    height.div_ceil(WORKGROUP_SIZE).max(1),
                    1,
                );
            }
            s.queue.submit(std::iter::once(encoder.finish()));
        })
    }

    fn read_back(&mut self, buffer: BufferId) -> SubstrateResult<Vec<f32>> {
        let grid = self.grid(buffer)?;
        let size = grid.bytes();

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Back Encoder"),
            });
        encoder.copy_buffer_to_buffer(&grid.buffer, 0, &staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| SubstrateError::Readback(e.to_string()))?
            .map_err(|e| SubstrateError::Readback(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let cells: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();
        staging_buffer.destroy();

        Ok(cells)
    }

    fn release(&mut self, buffer: BufferId) {
        if let Some(grid) = self.buffers.get_mut(buffer.0).and_then(Option::take) {
            grid.buffer.destroy();
        }
        if self.target == Some(buffer) {
            self.target = None;
        }
    }

    fn release_kernels(&mut self) {
        self.kernels = [None, None, None];
    }
}
