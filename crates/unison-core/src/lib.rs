//! Unison core crate.
//!
//! Host memory that the GPU can read and write, exposed to Rust as typed,
//! fixed-length views, plus compilation and dispatch of compute pipelines
//! over those buffers.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`device`] | `Device`, `DeviceInit`, process-wide `initialize` / `device` |
//! | [`buffer`] | `Buffer` views, `BufferRef` |
//! | [`pipeline`] | `Pipeline` |
//! | [`dispatch`] | `Grid`, `Device::run` |
//! | [`runtime`] | `DeviceRuntime` boundary and the `wgpu` implementation |
//! | [`logging`] | `init_logging` |
//!
//! # Quick start
//!
//! ```no_run
//! use unison_core::{initialize, DeviceInit};
//!
//! const ADD: &str = r#"
//!     @group(0) @binding(0) var<storage, read> a: array<i32>;
//!     @group(0) @binding(1) var<storage, read> b: array<i32>;
//!     @group(0) @binding(2) var<storage, read_write> out: array<i32>;
//!
//!     @compute @workgroup_size(64)
//!     fn add(@builtin(global_invocation_id) id: vec3<u32>) {
//!         if id.x < arrayLength(&out) {
//!             out[id.x] = a[id.x] + b[id.x];
//!         }
//!     }
//! "#;
//!
//! # fn main() -> Result<(), unison_core::Error> {
//! let device = initialize(DeviceInit::default())?;
//!
//! let mut a = device.allocate::<i32>(4)?;
//! let mut b = device.allocate::<i32>(4)?;
//! let mut out = device.allocate::<i32>(4)?;
//! a.copy_from_slice(&[1, 2, 3, 4]);
//! b.copy_from_slice(&[10, 20, 30, 40]);
//!
//! let add = device.compile(ADD, "add")?;
//! device.run(&add, &mut [&mut a, &mut b, &mut out])?;
//!
//! assert_eq!(&*out, &[11, 22, 33, 44]);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod device;
pub mod dispatch;
pub mod pipeline;
pub mod runtime;

pub mod logging;

mod error;
mod handle;

pub use buffer::{Buffer, BufferRef};
pub use device::{device, initialize, install, Device, DeviceInfo, DeviceInit};
pub use dispatch::Grid;
pub use error::{AllocationError, CompileError, DispatchError, Error, InitError, ResolveError};
pub use handle::{BufferHandle, DeviceId, PipelineHandle};
pub use logging::{init_logging, LoggingConfig};
pub use pipeline::Pipeline;
