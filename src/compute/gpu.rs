//! wgpu compute device.
//!
//! Fields live on the CPU; each call uploads what the kernel needs, runs the
//! compute passes, copies results into a staging buffer and maps it back.
//! GPU buffers are created per call and dropped (released) when it returns.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{
    workgroup_count, ComputeDevice, DispatchStats, RawBounds, WeatherMapJob, WorleyJob,
    PLANE_WORKGROUP_SIZE, VOLUME_WORKGROUP_SIZE,
};
use crate::error::{Error, Result};
use crate::field::{PlanarField, VolumetricField, Voxel};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SliceParams {
    resolution: u32,
    layer: u32,
    _padding: [u32; 2],
}

/// A compute pipeline with its bind group layout
struct Kernel {
    layout: wgpu::BindGroupLayout,
    pipelines: Vec<wgpu::ComputePipeline>,
}

pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    worley: Kernel,
    weather_map: Kernel,
    slice: Kernel,
    stats: DispatchStats,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuDevice {
    /// Request a high-performance adapter and build all kernels
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
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
            .ok_or_else(|| Error::Device("failed to find GPU adapter".to_string()))?;

        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cloud Noise Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let worley = Self::create_kernel(
            &device,
            "Worley",
            include_str!("worley.wgsl"),
            &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, true),
            ],
            &["raw", "remap"],
        );

        let weather_map = Self::create_kernel(
            &device,
            "Weather Map",
            include_str!("weather_map.wgsl"),
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
            &["main"],
        );

        let slice = Self::create_kernel(
            &device,
            "Slice",
            include_str!("slice.wgsl"),
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
            &["main"],
        );

        log::info!("GPU compute device ready: {}", adapter_name);

        Ok(Self {
            device,
            queue,
            adapter_name,
            worley,
            weather_map,
            slice,
            stats: DispatchStats::default(),
        })
    }

    /// Blocking constructor for synchronous hosts
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    fn create_kernel(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
        entry_points: &[&str],
    ) -> Kernel {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipelines = entry_points
            .iter()
            .map(|&entry_point| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(entry_point),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .collect();

        Kernel { layout, pipelines }
    }

    fn bind_group(&self, kernel: &Kernel, buffers: &[&wgpu::Buffer]) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &kernel.layout,
            entries: &entries,
        })
    }

    fn init_buffer(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    fn storage_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Copy `source` into a staging buffer, wait for the GPU and map it back
    fn read_buffer<T: Pod>(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<T>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let _ = self.device.poll(wgpu::Maintain::Wait);
        pollster::block_on(receiver)
            .map_err(|_| Error::Device("map callback dropped".to_string()))??;

        let data = buffer_slice.get_mapped_range();
        let result: Vec<T> = bytemuck::cast_slice(&data).to_vec();

        drop(data);
        staging.unmap();
        self.stats.record_readback();

        Ok(result)
    }

    fn volume_workgroups(resolution: u32) -> u32 {
        workgroup_count(resolution, VOLUME_WORKGROUP_SIZE)
    }
}

impl ComputeDevice for GpuDevice {
    fn label(&self) -> &str {
        &self.adapter_name
    }

    fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    fn dispatch_worley(
        &self,
        field: &mut VolumetricField,
        job: &WorleyJob<'_>,
    ) -> Result<RawBounds> {
        let resolution = field.resolution();
        if job.params.resolution != resolution {
            return Err(Error::ResolutionMismatch {
                expected: resolution,
                found: job.params.resolution,
            });
        }

        // vec3 in a storage array has a 16-byte stride
        let packed: Vec<[f32; 4]> = job
            .points
            .iter()
            .flat_map(|scale| scale.iter().map(|p| p.extend(0.0).to_array()))
            .collect();

        let params_buffer = self.init_buffer(
            "Worley Params",
            bytemuck::cast_slice(&[job.params]),
            wgpu::BufferUsages::UNIFORM,
        );
        let voxel_buffer = self.init_buffer(
            "Shape Voxels",
            field.as_bytes(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let min_max_buffer = self.init_buffer(
            "Min Max",
            bytemuck::cast_slice(&job.bounds.words()),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let points_buffer = self.init_buffer(
            "Feature Points",
            bytemuck::cast_slice(&packed),
            wgpu::BufferUsages::STORAGE,
        );

        let bind_group = self.bind_group(
            &self.worley,
            &[&params_buffer, &voxel_buffer, &min_max_buffer, &points_buffer],
        );

        let groups = Self::volume_workgroups(resolution);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Worley Encoder"),
            });

        // Separate passes: the remap pass observes the completed reduction
        for (pipeline, label) in self.worley.pipelines.iter().zip(["Worley Raw", "Worley Remap"]) {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, groups, groups);
            drop(pass);
            self.stats.record_dispatch();
        }
        self.queue.submit(Some(encoder.finish()));

        let voxels: Vec<Voxel> = self.read_buffer(&voxel_buffer, field.as_bytes().len() as u64)?;
        let words: Vec<u32> = self.read_buffer(&min_max_buffer, 8)?;
        field.voxels_mut().copy_from_slice(&voxels);
        job.bounds.merge_words([words[0], words[1]]);

        Ok(job.bounds.bounds())
    }

    fn dispatch_weather_map(&self, map: &mut PlanarField, job: &WeatherMapJob<'_>) -> Result<()> {
        let resolution = map.resolution();
        if job.params.resolution != resolution {
            return Err(Error::ResolutionMismatch {
                expected: resolution,
                found: job.params.resolution,
            });
        }

        let offsets: Vec<[f32; 4]> = job.offsets.iter().map(|o| o.to_array()).collect();
        let size = std::mem::size_of_val(map.texels()) as u64;

        let params_buffer = self.init_buffer(
            "Weather Map Params",
            bytemuck::cast_slice(&[job.params]),
            wgpu::BufferUsages::UNIFORM,
        );
        let offsets_buffer = self.init_buffer(
            "Octave Offsets",
            bytemuck::cast_slice(&offsets),
            wgpu::BufferUsages::STORAGE,
        );
        let output_buffer = self.storage_buffer("Weather Map", size);

        let bind_group = self.bind_group(
            &self.weather_map,
            &[&params_buffer, &offsets_buffer, &output_buffer],
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Weather Map Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Weather Map Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.weather_map.pipelines[0]);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = workgroup_count(resolution, PLANE_WORKGROUP_SIZE);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.stats.record_dispatch();

        let texels: Vec<f32> = self.read_buffer(&output_buffer, size)?;
        map.texels_mut().copy_from_slice(&texels);

        Ok(())
    }

    fn extract_slices(&self, field: &VolumetricField) -> Result<Vec<Vec<Voxel>>> {
        let resolution = field.resolution();
        let slice_size = (resolution as u64).pow(2) * std::mem::size_of::<Voxel>() as u64;

        let voxel_buffer =
            self.init_buffer("Slice Source", field.as_bytes(), wgpu::BufferUsages::STORAGE);
        let slice_buffer = self.storage_buffer("Slice", slice_size);
        let groups = workgroup_count(resolution, PLANE_WORKGROUP_SIZE);

        let mut slices = Vec::with_capacity(resolution as usize);
        for layer in 0..resolution {
            let params = SliceParams {
                resolution,
                layer,
                _padding: [0; 2],
            };
            let params_buffer = self.init_buffer(
                "Slice Params",
                bytemuck::cast_slice(&[params]),
                wgpu::BufferUsages::UNIFORM,
            );
            let bind_group =
                self.bind_group(&self.slice, &[&params_buffer, &voxel_buffer, &slice_buffer]);

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Slice Encoder"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Slice Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.slice.pipelines[0]);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups, groups, 1);
            }
            self.queue.submit(Some(encoder.finish()));
            self.stats.record_dispatch();

            slices.push(self.read_buffer(&slice_buffer, slice_size)?);
        }

        Ok(slices)
    }

    fn copy_volume(&self, source: &VolumetricField, target: &mut VolumetricField) -> Result<()> {
        if source.resolution() != target.resolution() {
            return Err(Error::ResolutionMismatch {
                expected: target.resolution(),
                found: source.resolution(),
            });
        }

        let size = source.as_bytes().len() as u64;
        let read = self.init_buffer("Copy Read", source.as_bytes(), wgpu::BufferUsages::COPY_SRC);
        let write = self.storage_buffer("Copy Write", size);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Copy Encoder"),
            });
        encoder.copy_buffer_to_buffer(&read, 0, &write, 0, size);
        self.queue.submit(Some(encoder.finish()));
        self.stats.record_dispatch();

        let voxels: Vec<Voxel> = self.read_buffer(&write, size)?;
        target.voxels_mut().copy_from_slice(&voxels);

        Ok(())
    }
}
