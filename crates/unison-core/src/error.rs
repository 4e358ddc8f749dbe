//! Error types, one per operation class.
//!
//! Every class is reported by the device runtime and passed through
//! unchanged. [`Error`] wraps them for callers that want a single type
//! without losing which class failed.

use thiserror::Error;

use crate::handle::{BufferHandle, PipelineHandle};

/// Device initialization failed. No compute is possible.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),

    #[error("failed to open GPU device: {0}")]
    RequestDevice(String),
}

/// Device source was rejected by the compiler.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to parse device source:\n{0}")]
    Parse(String),

    #[error("device source failed validation:\n{0}")]
    Validation(String),

    #[error("entry point `{0}` not found in device source")]
    MissingEntryPoint(String),

    #[error("entry point `{0}` is not a compute entry point")]
    NotCompute(String),

    #[error("binding `{name}` at @group({group}) @binding({binding}) is not supported: {reason}")]
    UnsupportedBinding {
        name: String,
        group: u32,
        binding: u32,
        reason: &'static str,
    },

    #[error("device rejected pipeline `{entry_point}`: {message}")]
    Pipeline { entry_point: String, message: String },

    #[error("entry point `{entry_point}` uses @binding({found}) but @binding({missing}) is unused; bindings must be contiguous from 0")]
    BindingGap {
        entry_point: String,
        missing: u32,
        found: u32,
    },
}

/// Shared buffer allocation failed.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("{count} elements of {element_size} bytes overflow the address space")]
    Overflow { count: usize, element_size: usize },

    #[error("requested {requested} bytes but the device allows at most {limit}")]
    TooLarge { requested: u64, limit: u64 },

    #[error("host allocation of {0} bytes failed")]
    HostOutOfMemory(usize),

    #[error("runtime allocated {0} but cannot resolve its host memory")]
    Unresolvable(BufferHandle),
}

/// A dispatch was rejected or failed on the device.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown {0}")]
    UnknownPipeline(PipelineHandle),

    #[error("unknown {0}")]
    UnknownBuffer(BufferHandle),

    #[error("pipeline expects {expected} buffer arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("{0} is bound to more than one argument")]
    DuplicateArgument(BufferHandle),

    #[error("binding {binding} (`{name}`) needs at least {required} bytes, got {actual}")]
    BindingTooSmall {
        binding: usize,
        name: String,
        required: u64,
        actual: u64,
    },

    #[error("dispatch of {requested} workgroups exceeds the per-dimension limit of {limit}")]
    GridTooLarge { requested: u64, limit: u32 },

    #[error("device execution failed: {0}")]
    Device(String),
}

/// A buffer handle could not be resolved to host memory.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown {0}")]
    UnknownBuffer(BufferHandle),

    #[error("{handle} holds {byte_len} bytes, not a whole number of {element_size}-byte elements")]
    Misaligned {
        handle: BufferHandle,
        byte_len: usize,
        element_size: usize,
    },

    #[error("{handle} base address is not aligned to {align} bytes")]
    Unaligned { handle: BufferHandle, align: usize },
}

/// Any failure reported by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
