//! Compute device management.
//!
//! This module is responsible for:
//! - selecting an adapter and opening the device (through the runtime)
//! - holding the process-wide device established by [`initialize`]
//! - owning the runtime that backs every buffer and pipeline

mod init;
mod session;

use std::fmt;

use crate::error::InitError;
use crate::handle::DeviceId;
use crate::runtime::{DeviceRuntime, WgpuRuntime};

pub use crate::runtime::DeviceInfo;
pub use init::DeviceInit;
pub use session::{device, initialize, install};

/// The selected compute device.
///
/// Buffers and pipelines borrow the device they were created from, so none
/// of them can outlive it. Dropping an owned device releases every
/// allocation it made; the process-wide device from [`initialize`] is never
/// dropped.
pub struct Device {
    id: DeviceId,
    runtime: Box<dyn DeviceRuntime>,
    info: DeviceInfo,
}

impl Device {
    /// Opens a device backed by wgpu.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
    pub fn new(init: DeviceInit) -> Result<Self, InitError> {
        let runtime = pollster::block_on(WgpuRuntime::request(&init))?;
        Ok(Self::with_runtime(runtime))
    }

    /// Wraps an already initialized runtime.
    pub fn with_runtime(runtime: impl DeviceRuntime + 'static) -> Self {
        let info = runtime.info();
        log::info!("compute device: {} ({})", info.name, info.backend);

        Self {
            id: DeviceId::next(),
            runtime: Box::new(runtime),
            info,
        }
    }

    /// Identity stamped on every buffer and pipeline this device creates.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the adapter description.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub(crate) fn runtime(&self) -> &dyn DeviceRuntime {
        self.runtime.as_ref()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
