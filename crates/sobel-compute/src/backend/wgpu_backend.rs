//! wgpu executor.
//!
//! A single host thread uploads the whole image, dispatches `blocks` work
//! groups of `threads_per_block` work-items, waits for the queue, and reads
//! the result back. There is no host-side row split: the device scheduler
//! spreads work-items over the pixel index space. The rescale still needs the
//! host-side global reduction before it is enqueued.

use bytemuck::{Pod, Zeroable};
use sobel_core::{validate_partitions, ImageBuffer, Partition, Pass, Rescaler, ValueRange};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use super::PassExecutor;
use crate::config::WgpuConfig;
use crate::shaders;
use crate::{ComputeError, ComputeResult};

/// Kernel parameters uniform: four `u32`s, meaning depends on the kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ParamsUniform {
    params: [u32; 4],
}

/// Accelerator-offload executor.
pub struct WgpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    gradient: wgpu::ComputePipeline,
    rescale: wgpu::ComputePipeline,
    config: WgpuConfig,
    max_binding_bytes: u64,
}

impl WgpuExecutor {
    /// Check if a wgpu adapter is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Opens a device and compiles both kernels for `config`'s sizing.
    pub fn new(config: WgpuConfig) -> ComputeResult<Self> {
        pollster::block_on(Self::new_async(config))
    }

    /// Asynchronous form of [`new`](Self::new).
    pub async fn new_async(config: WgpuConfig) -> ComputeResult<Self> {
        if config.blocks == 0 || config.threads_per_block == 0 {
            return Err(ComputeError::Configuration(format!(
                "blocks and threads per block must be positive, got {} and {}",
                config.blocks, config.threads_per_block
            )));
        }
        if config.blocks.checked_mul(config.threads_per_block).is_none() {
            return Err(ComputeError::Configuration(format!(
                "{} blocks x {} threads overflows the work-item index",
                config.blocks, config.threads_per_block
            )));
        }

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
            .ok_or(ComputeError::NoAdapter)?;

        let limits = adapter.limits();
        if config.threads_per_block > limits.max_compute_workgroup_size_x
            || config.threads_per_block > limits.max_compute_invocations_per_workgroup
        {
            return Err(ComputeError::Configuration(format!(
                "{} threads per block exceeds the device limit of {}",
                config.threads_per_block,
                limits
                    .max_compute_workgroup_size_x
                    .min(limits.max_compute_invocations_per_workgroup)
            )));
        }
        if config.blocks > limits.max_compute_workgroups_per_dimension {
            return Err(ComputeError::Configuration(format!(
                "{} blocks exceeds the device limit of {}",
                config.blocks, limits.max_compute_workgroups_per_dimension
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("sobel_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        let create_pipeline = |source: &str, label: &str| -> wgpu::ComputePipeline {
            let source = shaders::with_workgroup_size(source, config.threads_per_block);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let gradient = create_pipeline(shaders::GRADIENT, "gradient_pipeline");
        let rescale = create_pipeline(shaders::RESCALE, "rescale_pipeline");

        debug!(
            adapter = %adapter.get_info().name,
            blocks = config.blocks,
            threads_per_block = config.threads_per_block,
            "wgpu device ready"
        );

        Ok(Self {
            device,
            queue,
            gradient,
            rescale,
            config,
            max_binding_bytes: limits.max_storage_buffer_binding_size as u64,
        })
    }

    fn stride(&self) -> u32 {
        self.config.blocks * self.config.threads_per_block
    }

    /// Runs one kernel over `src`, returning the downloaded output.
    fn execute(
        &self,
        pipeline: &wgpu::ComputePipeline,
        src: &[u32],
        params: [u32; 4],
    ) -> ComputeResult<Vec<u32>> {
        let size = std::mem::size_of_val(src) as u64;
        if size > self.max_binding_bytes {
            return Err(ComputeError::OperationFailed(format!(
                "image of {size} bytes exceeds the device binding limit of {} bytes",
                self.max_binding_bytes
            )));
        }

        let src_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("src_buffer"),
            contents: bytemuck::cast_slice(src),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let dst_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dst_buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params_uniform"),
            contents: bytemuck::bytes_of(&ParamsUniform { params }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sobel_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sobel_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sobel_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(self.config.blocks, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&dst_buf, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| ComputeError::OperationFailed("map channel closed".into()))?
            .map_err(|e| ComputeError::OperationFailed(format!("map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }
}

impl PassExecutor for WgpuExecutor {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    /// One logical worker: the device schedules the work-items itself.
    fn workers(&self) -> u32 {
        1
    }

    fn run_pass(
        &mut self,
        image: &mut ImageBuffer,
        partitions: &[Partition],
        pass: &Pass,
    ) -> ComputeResult<Vec<ValueRange>> {
        validate_partitions(partitions, image.height())?;
        let total = image.len() as u32;
        let stride = self.stride();
        trace!(pass = pass.name(), total, stride, "wgpu pass");

        let out = match pass {
            Pass::Gradient => self.execute(
                &self.gradient,
                image.pixels(),
                [image.width(), image.height(), total, stride],
            )?,
            Pass::Rescale(Rescaler::Flat) => {
                self.execute(&self.rescale, image.pixels(), [0, 0, total, stride])?
            }
            Pass::Rescale(Rescaler::Linear { min, span }) => {
                if *span > u32::MAX / 511 {
                    return Err(ComputeError::OperationFailed(format!(
                        "value span {span} too large for 32-bit device arithmetic"
                    )));
                }
                self.execute(&self.rescale, image.pixels(), [*min, *span, total, stride])?
            }
        };

        let width = image.width();
        let ranges = partitions
            .iter()
            .map(|p| ValueRange::of(&out[p.index_range(width)]))
            .collect();
        image.replace_pixels(out)?;
        Ok(ranges)
    }
}
