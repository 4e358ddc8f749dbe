//! Boundary to the device runtime.
//!
//! The core never talks to a GPU API directly. Everything it needs is the
//! handful of primitives on [`DeviceRuntime`]:
//! - compile device source into a pipeline
//! - allocate host-and-device visible memory
//! - resolve an allocation to its host base address
//! - dispatch a pipeline over an ordered list of allocations
//!
//! [`WgpuRuntime`] is the implementation used by [`crate::Device::new`].

mod host;
pub mod gpu;

use std::ptr::NonNull;

use crate::dispatch::Grid;
use crate::error::{AllocationError, CompileError, DispatchError, ResolveError};
use crate::handle::{BufferHandle, PipelineHandle};

pub use gpu::WgpuRuntime;
pub use host::HostMemory;

/// Alignment every runtime must guarantee for host base addresses.
pub const HOST_ALIGNMENT: usize = 16;

/// Host-visible memory backing one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRegion {
    /// First byte of the allocation, aligned to [`HOST_ALIGNMENT`].
    pub base: NonNull<u8>,

    /// Length requested at allocation time.
    pub byte_len: usize,
}

/// Adapter description for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub backend: String,
}

/// Primitives consumed from the device runtime.
///
/// Implementations own every allocation and pipeline they hand out. Memory
/// behind a [`HostRegion`] must stay at the same address, zero-initialized
/// on allocation, until [`DeviceRuntime::free`] is called for it or the
/// runtime is dropped. Handles are never reused and never equal
/// [`BufferHandle::NULL`].
pub trait DeviceRuntime: Send + Sync {
    /// Describes the selected adapter.
    fn info(&self) -> DeviceInfo;

    /// Compiles `source` and returns a handle to the `entry_point` function.
    fn compile(&self, source: &str, entry_point: &str) -> Result<PipelineHandle, CompileError>;

    /// Allocates `byte_length` bytes (non-zero) of shared memory.
    fn allocate(&self, byte_length: usize) -> Result<BufferHandle, AllocationError>;

    /// Returns the host memory behind `buffer`, or `None` if the handle is not live.
    fn resolve(&self, buffer: BufferHandle) -> Option<HostRegion>;

    /// Runs `pipeline` with `buffers[i]` bound to argument `i`.
    ///
    /// Returns once device-side writes are visible in host memory.
    fn dispatch(
        &self,
        pipeline: PipelineHandle,
        buffers: &[BufferHandle],
        grid: Grid,
    ) -> Result<(), DispatchError>;

    /// Releases an allocation. Its host region becomes invalid.
    fn free(&self, buffer: BufferHandle) -> Result<(), ResolveError>;
}
