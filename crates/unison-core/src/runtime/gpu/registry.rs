use std::collections::HashMap;
use std::sync::Arc;

use crate::handle::{BufferHandle, PipelineHandle};
use crate::runtime::HostMemory;

use super::signature::KernelSignature;

/// One shared allocation: the host memory callers alias plus its device mirror.
#[derive(Debug, Clone)]
pub(super) struct BufferEntry {
    pub host: Arc<HostMemory>,
    pub gpu: wgpu::Buffer,
    /// `host.byte_len()` rounded up to `wgpu::COPY_BUFFER_ALIGNMENT`.
    pub device_len: u64,
}

#[derive(Debug, Clone)]
pub(super) struct PipelineEntry {
    pub pipeline: wgpu::ComputePipeline,
    pub signature: Arc<KernelSignature>,
}

/// Handle tables for one runtime.
///
/// Entries are cloned out under the lock so that device work never runs
/// while it is held. Ids start at 1 and are never reused.
#[derive(Debug)]
pub(super) struct Registry {
    buffers: HashMap<BufferHandle, BufferEntry>,
    pipelines: HashMap<PipelineHandle, PipelineEntry>,
    next_buffer: u64,
    next_pipeline: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            pipelines: HashMap::new(),
            next_buffer: 1,
            next_pipeline: 1,
        }
    }

    pub fn insert_buffer(&mut self, entry: BufferEntry) -> BufferHandle {
        let handle = BufferHandle::new(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(handle, entry);
        handle
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferEntry> {
        self.buffers.get(&handle)
    }

    pub fn remove_buffer(&mut self, handle: BufferHandle) -> Option<BufferEntry> {
        self.buffers.remove(&handle)
    }

    pub fn insert_pipeline(&mut self, entry: PipelineEntry) -> PipelineHandle {
        let handle = PipelineHandle::new(self.next_pipeline);
        self.next_pipeline += 1;
        self.pipelines.insert(handle, entry);
        handle
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> Option<&PipelineEntry> {
        self.pipelines.get(&handle)
    }
}
