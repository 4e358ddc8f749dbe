//! wgpu implementation of [`DeviceRuntime`].
//!
//! Each allocation pairs a fixed host region (what callers alias) with a
//! device storage buffer. A dispatch:
//! - uploads every bound host region
//! - records the compute pass
//! - copies writable bindings into per-dispatch staging buffers
//! - waits for the submission and copies the results back into host memory
//!
//! The transfer is internal; callers only ever see the host region.
//!
//! wgpu validation failures are captured with error scopes and returned as
//! typed errors instead of reaching the uncaptured-error handler.

mod registry;
mod signature;

use std::collections::HashSet;
use std::sync::{mpsc, Arc};

use parking_lot::Mutex;

use crate::device::DeviceInit;
use crate::dispatch::Grid;
use crate::error::{AllocationError, CompileError, DispatchError, InitError, ResolveError};
use crate::handle::{BufferHandle, PipelineHandle};
use crate::runtime::{DeviceInfo, DeviceRuntime, HostMemory, HostRegion};

use registry::{BufferEntry, PipelineEntry, Registry};

/// Owns the wgpu device/queue and every resource handed out through it.
pub struct WgpuRuntime {
    /// Logical device.
    device: wgpu::Device,

    /// Command queue. All dispatches go through this single queue.
    queue: wgpu::Queue,

    info: DeviceInfo,

    registry: Mutex<Registry>,
}

impl WgpuRuntime {
    /// Selects an adapter and opens a device.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn request(init: &DeviceInit) -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .map_err(|e| InitError::NoAdapter(e.to_string()))?;

        let required_limits = init
            .required_limits
            .clone()
            .unwrap_or_else(|| adapter.limits());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(init.label.as_str()),
                required_features: init.required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| InitError::RequestDevice(e.to_string()))?;

        let adapter_info = adapter.get_info();
        let info = DeviceInfo {
            name: adapter_info.name,
            backend: format!("{:?}", adapter_info.backend),
        };

        Ok(Self {
            device,
            queue,
            info,
            registry: Mutex::new(Registry::new()),
        })
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Largest buffer that can still be bound as a storage buffer.
    fn max_binding_size(&self) -> u64 {
        let limits = self.device.limits();
        limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64)
    }

    fn lookup(
        &self,
        pipeline: PipelineHandle,
        buffers: &[BufferHandle],
    ) -> Result<(PipelineEntry, Vec<BufferEntry>), DispatchError> {
        let registry = self.registry.lock();

        let pipeline_entry = registry
            .pipeline(pipeline)
            .cloned()
            .ok_or(DispatchError::UnknownPipeline(pipeline))?;

        let bound = buffers
            .iter()
            .map(|&handle| {
                registry
                    .buffer(handle)
                    .cloned()
                    .ok_or(DispatchError::UnknownBuffer(handle))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((pipeline_entry, bound))
    }

    /// Waits for `submission` and copies every mapped staging buffer back
    /// into its host region.
    fn read_back(
        &self,
        submission: wgpu::SubmissionIndex,
        readbacks: &[(&BufferEntry, wgpu::Buffer)],
    ) -> Result<(), DispatchError> {
        let (sender, receiver) = mpsc::channel();
        for (index, (_, staging)) in readbacks.iter().enumerate() {
            let sender = sender.clone();
            staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send((index, result));
            });
        }
        drop(sender);

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|e| DispatchError::Device(format!("GPU poll failed: {e}")))?;

        let mut mapped = 0;
        for (index, result) in receiver.try_iter() {
            result.map_err(|e| DispatchError::Device(format!("readback map failed: {e}")))?;

            let (entry, staging) = &readbacks[index];
            {
                let view = staging.slice(..).get_mapped_range();
                // SAFETY: bound views are mutably borrowed by the dispatcher
                // for the whole call; the device mirror fits in host capacity.
                unsafe { entry.host.write(&view) };
            }
            staging.unmap();
            mapped += 1;

            log::trace!("read back {} bytes", entry.device_len);
        }

        if mapped != readbacks.len() {
            return Err(DispatchError::Device(format!(
                "only {mapped} of {} readbacks completed",
                readbacks.len()
            )));
        }

        Ok(())
    }
}

impl DeviceRuntime for WgpuRuntime {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn compile(&self, source: &str, entry_point: &str) -> Result<PipelineHandle, CompileError> {
        let signature = signature::inspect(source, entry_point)?;

        // Limits such as the maximum workgroup size are only checked here.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry_point),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(CompileError::Pipeline {
                entry_point: entry_point.to_string(),
                message: error.to_string(),
            });
        }

        log::trace!(
            "`{}` binds [{}], workgroup size {:?}",
            signature.entry_point,
            signature
                .bindings
                .iter()
                .map(|slot| slot.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            signature.workgroup_size
        );

        let handle = self.registry.lock().insert_pipeline(PipelineEntry {
            pipeline,
            signature: Arc::new(signature),
        });
        Ok(handle)
    }

    fn allocate(&self, byte_length: usize) -> Result<BufferHandle, AllocationError> {
        let device_len = (byte_length as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let limit = self.max_binding_size();
        if device_len > limit {
            return Err(AllocationError::TooLarge {
                requested: device_len,
                limit,
            });
        }

        let host = HostMemory::zeroed(byte_length)?;
        let gpu = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("unison shared buffer"),
            size: device_len,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = self.registry.lock().insert_buffer(BufferEntry {
            host: Arc::new(host),
            gpu,
            device_len,
        });
        Ok(handle)
    }

    fn resolve(&self, buffer: BufferHandle) -> Option<HostRegion> {
        self.registry
            .lock()
            .buffer(buffer)
            .map(|entry| entry.host.region())
    }

    fn dispatch(
        &self,
        pipeline: PipelineHandle,
        buffers: &[BufferHandle],
        grid: Grid,
    ) -> Result<(), DispatchError> {
        let (pipeline, bound) = self.lookup(pipeline, buffers)?;
        let signature = &pipeline.signature;

        if bound.len() != signature.bindings.len() {
            return Err(DispatchError::ArgumentCount {
                expected: signature.bindings.len(),
                actual: bound.len(),
            });
        }

        let mut seen = HashSet::with_capacity(buffers.len());
        if let Some(&twice) = buffers.iter().find(|&&handle| !seen.insert(handle)) {
            return Err(DispatchError::DuplicateArgument(twice));
        }

        for (binding, (entry, slot)) in bound.iter().zip(&signature.bindings).enumerate() {
            if entry.device_len < slot.min_size {
                return Err(DispatchError::BindingTooSmall {
                    binding,
                    name: slot.name.clone(),
                    required: slot.min_size,
                    actual: entry.device_len,
                });
            }
        }

        let largest = bound.iter().map(|entry| entry.host.byte_len()).max().unwrap_or(0);
        let [x, y, z] = grid.workgroups(
            largest,
            signature.workgroup_size[0],
            self.device.limits().max_compute_workgroups_per_dimension,
        )?;

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        for entry in &bound {
            // SAFETY: bound views are mutably borrowed by the dispatcher for
            // the whole call; `device_len` never exceeds host capacity.
            let bytes = unsafe { entry.host.bytes(entry.device_len as usize) };
            self.queue.write_buffer(&entry.gpu, 0, bytes);
            log::trace!("uploaded {} bytes", entry.device_len);
        }

        let bind_group = (!bound.is_empty()).then(|| {
            let layout = pipeline.pipeline.get_bind_group_layout(0);
            let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
                .iter()
                .enumerate()
                .map(|(binding, entry)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: entry.gpu.as_entire_binding(),
                })
                .collect();

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(signature.entry_point.as_str()),
                layout: &layout,
                entries: &entries,
            })
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("unison dispatch encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(signature.entry_point.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }

        let readbacks: Vec<(&BufferEntry, wgpu::Buffer)> = bound
            .iter()
            .zip(&signature.bindings)
            .filter(|(_, slot)| slot.writable)
            .map(|(entry, _)| {
                let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("unison readback"),
                    size: entry.device_len,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                encoder.copy_buffer_to_buffer(&entry.gpu, 0, &staging, 0, entry.device_len);
                (entry, staging)
            })
            .collect();

        let submission = self.queue.submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(DispatchError::Device(error.to_string()));
        }

        self.read_back(submission, &readbacks)
    }

    fn free(&self, buffer: BufferHandle) -> Result<(), ResolveError> {
        self.registry
            .lock()
            .remove_buffer(buffer)
            .map(drop)
            .ok_or(ResolveError::UnknownBuffer(buffer))
    }
}
