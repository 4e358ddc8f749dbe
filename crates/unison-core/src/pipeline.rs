use std::marker::PhantomData;

use crate::device::Device;
use crate::error::CompileError;
use crate::handle::{DeviceId, PipelineHandle};

/// A compiled compute function, reusable for any number of dispatches.
///
/// Borrows the [`Device`] that compiled it; the handle stays valid for the
/// device's lifetime.
#[derive(Debug)]
pub struct Pipeline<'d> {
    device: DeviceId,
    handle: PipelineHandle,
    entry_point: String,
    _device: PhantomData<&'d Device>,
}

impl Pipeline<'_> {
    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }

    /// Device that compiled this pipeline.
    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    /// Name of the compiled function.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

impl Device {
    /// Compiles `entry_point` from WGSL `source`.
    ///
    /// The source is handed to the runtime compiler as-is and is not kept.
    /// Compute entry points bind storage buffers from `@group(0)`,
    /// `@binding(0)` upward, one per dispatch argument.
    pub fn compile(&self, source: &str, entry_point: &str) -> Result<Pipeline<'_>, CompileError> {
        let handle = self.runtime().compile(source, entry_point)?;
        log::debug!("compiled `{entry_point}` as {handle}");

        Ok(Pipeline {
            device: self.id(),
            handle,
            entry_point: entry_point.to_owned(),
            _device: PhantomData,
        })
    }
}
