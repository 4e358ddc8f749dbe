//! Dispatching pipelines over shared buffers.
//!
//! Every dispatch is blocking: when [`Device::run`] returns, device work has
//! completed and its writes are visible through the bound views.
//!
//! Ordering between dispatches issued from different threads is the device
//! queue's submission order (first in, first out). This layer does not
//! serialize them; racing dispatches that bind the same allocation through
//! raw handles leave the host-side result unspecified.

use crate::buffer::BufferRef;
use crate::device::Device;
use crate::error::DispatchError;
use crate::handle::BufferHandle;
use crate::pipeline::Pipeline;

/// Bytes per invocation when the grid is derived from buffer sizes.
pub const AUTO_INVOCATION_BYTES: usize = 4;

/// Number of workgroups to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grid {
    /// One invocation per 32-bit word of the largest bound buffer, at least
    /// one, grouped by the entry point's `@workgroup_size` x-dimension.
    #[default]
    Auto,

    /// Explicit `[x, y, z]` workgroup counts.
    Workgroups([u32; 3]),
}

impl Grid {
    /// `x` workgroups along one dimension.
    pub const fn linear(x: u32) -> Self {
        Self::Workgroups([x, 1, 1])
    }

    /// Resolves to concrete workgroup counts.
    ///
    /// `largest_byte_len` is the size of the largest bound buffer and
    /// `workgroup_x` the entry point's declared workgroup width. Counts above
    /// `limit` are rejected.
    pub fn workgroups(
        self,
        largest_byte_len: usize,
        workgroup_x: u32,
        limit: u32,
    ) -> Result<[u32; 3], DispatchError> {
        let groups = match self {
            Grid::Workgroups(groups) => groups,
            Grid::Auto => {
                let invocations = largest_byte_len.div_ceil(AUTO_INVOCATION_BYTES).max(1) as u64;
                let x = invocations.div_ceil(u64::from(workgroup_x.max(1)));
                let x = u32::try_from(x)
                    .map_err(|_| DispatchError::GridTooLarge { requested: x, limit })?;
                [x, 1, 1]
            }
        };

        if let Some(&over) = groups.iter().find(|&&g| g > limit) {
            return Err(DispatchError::GridTooLarge {
                requested: u64::from(over),
                limit,
            });
        }

        Ok(groups)
    }
}

impl Device {
    /// Runs `pipeline` with `buffers[i]` bound to `@binding(i)`, sizing the
    /// grid with [`Grid::Auto`].
    ///
    /// Blocks until the device has finished. Errors from the runtime are
    /// returned unchanged.
    pub fn run(
        &self,
        pipeline: &Pipeline<'_>,
        buffers: &mut [&mut dyn BufferRef],
    ) -> Result<(), DispatchError> {
        self.run_with(pipeline, Grid::Auto, buffers)
    }

    /// Like [`Device::run`] with an explicit grid.
    ///
    /// Buffers allocated by another device are rejected as unknown.
    pub fn run_with(
        &self,
        pipeline: &Pipeline<'_>,
        grid: Grid,
        buffers: &mut [&mut dyn BufferRef],
    ) -> Result<(), DispatchError> {
        if let Some(foreign) = buffers.iter().find(|b| b.device_id() != self.id()) {
            return Err(DispatchError::UnknownBuffer(foreign.buffer_handle()));
        }
        let handles: Vec<BufferHandle> = buffers.iter().map(|b| b.buffer_handle()).collect();

        // SAFETY: every handle comes from a `BufferRef` that is mutably
        // borrowed until this call returns.
        unsafe { self.run_handles(pipeline, grid, &handles) }
    }

    /// Runs `pipeline` over raw buffer handles.
    ///
    /// Handles are looked up in this device only. A pipeline compiled by
    /// another device is rejected.
    ///
    /// # Safety
    ///
    /// No view of any bound allocation may be borrowed, on any thread, until
    /// this call returns: the device overwrites that memory. Every handle
    /// must have been issued by this device.
    pub unsafe fn run_handles(
        &self,
        pipeline: &Pipeline<'_>,
        grid: Grid,
        handles: &[BufferHandle],
    ) -> Result<(), DispatchError> {
        if pipeline.device_id() != self.id() {
            return Err(DispatchError::UnknownPipeline(pipeline.handle()));
        }

        log::debug!(
            "dispatching {} `{}` over {:?} ({grid:?})",
            pipeline.handle(),
            pipeline.entry_point(),
            handles
        );

        self.runtime().dispatch(pipeline.handle(), handles, grid)
    }
}
