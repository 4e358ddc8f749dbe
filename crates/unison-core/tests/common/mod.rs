//! Host-only device runtime shared by the integration tests.
//!
//! Kernels are recognized by entry point name and run on the CPU over
//! `i32` buffers, so the buffer and dispatch layers can be exercised
//! without a GPU.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use unison_core::runtime::{DeviceInfo, DeviceRuntime, HostMemory, HostRegion};
use unison_core::{
    AllocationError, BufferHandle, CompileError, Device, DispatchError, Grid, PipelineHandle,
    ResolveError,
};

pub const MAX_WORKGROUPS: u32 = 65_535;

pub const ADD: &str = "fn add(a, b, out) { out = a + b }";
pub const SUB: &str = "fn sub(a, b, out) { out = a - b }";
pub const COPY: &str = "fn copy(src, dst) { dst = src }";
pub const NOOP: &str = "fn noop() {}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel {
    Add,
    Sub,
    Copy,
    Noop,
}

impl Kernel {
    fn named(entry_point: &str) -> Option<Self> {
        match entry_point {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "copy" => Some(Self::Copy),
            "noop" => Some(Self::Noop),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Add | Self::Sub => 3,
            Self::Copy => 2,
            Self::Noop => 0,
        }
    }
}

/// Calls observed by a [`MockRuntime`], readable after it is moved into a device.
#[derive(Debug, Default)]
pub struct Calls {
    pub allocate: AtomicUsize,
    pub dispatch: AtomicUsize,
}

impl Calls {
    pub fn allocations(&self) -> usize {
        self.allocate.load(Ordering::SeqCst)
    }

    pub fn dispatches(&self) -> usize {
        self.dispatch.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct State {
    buffers: HashMap<BufferHandle, HostMemory>,
    pipelines: HashMap<PipelineHandle, Kernel>,
    next_id: u64,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<State>,
    calls: Arc<Calls>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }
}

/// A device backed by a fresh [`MockRuntime`].
pub fn mock_device() -> (Device, Arc<Calls>) {
    let runtime = MockRuntime::new();
    let calls = runtime.calls();
    (Device::with_runtime(runtime), calls)
}

fn read_words(memory: &HostMemory) -> Vec<i32> {
    // SAFETY: the dispatcher holds every bound view mutably.
    let bytes = unsafe { memory.bytes(memory.byte_len()) };
    bytes
        .chunks_exact(4)
        .map(|word| i32::from_ne_bytes(word.try_into().unwrap()))
        .collect()
}

impl DeviceRuntime for MockRuntime {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "mock".to_string(),
            backend: "host".to_string(),
        }
    }

    fn compile(&self, source: &str, entry_point: &str) -> Result<PipelineHandle, CompileError> {
        if !source.contains(&format!("fn {entry_point}(")) {
            return Err(CompileError::MissingEntryPoint(entry_point.to_string()));
        }
        let kernel = Kernel::named(entry_point)
            .ok_or_else(|| CompileError::Validation(format!("no host kernel `{entry_point}`")))?;

        let mut state = self.state.lock();
        let handle = PipelineHandle::new(state.next());
        state.pipelines.insert(handle, kernel);
        Ok(handle)
    }

    fn allocate(&self, byte_length: usize) -> Result<BufferHandle, AllocationError> {
        self.calls.allocate.fetch_add(1, Ordering::SeqCst);

        let memory = HostMemory::zeroed(byte_length)?;
        let mut state = self.state.lock();
        let handle = BufferHandle::new(state.next());
        state.buffers.insert(handle, memory);
        Ok(handle)
    }

    fn resolve(&self, buffer: BufferHandle) -> Option<HostRegion> {
        self.state.lock().buffers.get(&buffer).map(HostMemory::region)
    }

    fn dispatch(
        &self,
        pipeline: PipelineHandle,
        buffers: &[BufferHandle],
        grid: Grid,
    ) -> Result<(), DispatchError> {
        self.calls.dispatch.fetch_add(1, Ordering::SeqCst);

        let state = self.state.lock();
        let kernel = *state
            .pipelines
            .get(&pipeline)
            .ok_or(DispatchError::UnknownPipeline(pipeline))?;
        let bound = buffers
            .iter()
            .map(|handle| {
                state
                    .buffers
                    .get(handle)
                    .ok_or(DispatchError::UnknownBuffer(*handle))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if bound.len() != kernel.arity() {
            return Err(DispatchError::ArgumentCount {
                expected: kernel.arity(),
                actual: bound.len(),
            });
        }
        for (i, handle) in buffers.iter().enumerate() {
            if buffers[..i].contains(handle) {
                return Err(DispatchError::DuplicateArgument(*handle));
            }
        }

        let largest = bound.iter().map(|m| m.byte_len()).max().unwrap_or(0);
        grid.workgroups(largest, 1, MAX_WORKGROUPS)?;

        let (out, result) = match kernel {
            Kernel::Noop => return Ok(()),
            Kernel::Copy => (bound[1], read_words(bound[0])),
            Kernel::Add | Kernel::Sub => {
                let a = read_words(bound[0]);
                let b = read_words(bound[1]);
                let len = bound[2].byte_len() / 4;
                let result = (0..len)
                    .map(|i| {
                        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
                        if kernel == Kernel::Add { x.wrapping_add(y) } else { x.wrapping_sub(y) }
                    })
                    .collect();
                (bound[2], result)
            }
        };

        let bytes: &[u8] = bytemuck::cast_slice(&result);
        let len = bytes.len().min(out.byte_len());
        // SAFETY: as in `read_words`; `len` is within the allocation.
        unsafe { out.write(&bytes[..len]) };
        Ok(())
    }

    fn free(&self, buffer: BufferHandle) -> Result<(), ResolveError> {
        self.state
            .lock()
            .buffers
            .remove(&buffer)
            .map(drop)
            .ok_or(ResolveError::UnknownBuffer(buffer))
    }
}
