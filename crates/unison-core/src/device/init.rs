/// Initialization parameters for the compute device.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    /// Backends wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    /// Adapter preference when several GPUs are present.
    ///
    /// High performance usually selects the discrete GPU, which is what
    /// compute workloads want.
    pub power_preference: wgpu::PowerPreference,

    /// Accept only a software fallback adapter.
    ///
    /// Useful on CI machines without a GPU.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    ///
    /// `None` requests everything the adapter supports, which gives the
    /// largest possible shared buffers.
    pub required_limits: Option<wgpu::Limits>,

    /// Debug label of the logical device.
    pub label: String,
}

impl Default for DeviceInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: None,
            label: "unison device".to_string(),
        }
    }
}
