use parking_lot::{const_mutex, Mutex};
use state::InitCell;

use crate::error::InitError;
use crate::runtime::DeviceRuntime;

use super::{Device, DeviceInit};

static DEVICE: InitCell<Device> = InitCell::new();
static INIT: Mutex<()> = const_mutex(());

/// Initializes the process-wide device once.
///
/// Must be called before the process-wide device is used. This function is
/// idempotent; subsequent calls return the existing device and ignore
/// `init`. Concurrent first calls create exactly one device.
pub fn initialize(init: DeviceInit) -> Result<&'static Device, InitError> {
    install_with(|| Device::new(init))
}

/// Installs `runtime` as the process-wide device.
///
/// Same contract as [`initialize`]; if a device already exists, `runtime`
/// is dropped.
pub fn install(runtime: impl DeviceRuntime + 'static) -> Result<&'static Device, InitError> {
    install_with(|| Ok(Device::with_runtime(runtime)))
}

/// Returns the process-wide device, if initialized.
pub fn device() -> Option<&'static Device> {
    DEVICE.try_get()
}

fn install_with(
    create: impl FnOnce() -> Result<Device, InitError>,
) -> Result<&'static Device, InitError> {
    if let Some(existing) = already_initialized() {
        return Ok(existing);
    }

    let _guard = INIT.lock();
    if let Some(existing) = already_initialized() {
        return Ok(existing);
    }

    let stored = DEVICE.set(create()?);
    debug_assert!(stored, "device set outside the init lock");
    log::debug!("process-wide device initialized");

    Ok(DEVICE.get())
}

fn already_initialized() -> Option<&'static Device> {
    let existing = DEVICE.try_get()?;
    log::warn!("compute device already initialized; ignoring new configuration");
    Some(existing)
}
