//! Shared buffers: runtime-owned memory seen by the host as `[T]`.
//!
//! A [`Buffer`] does not own its memory. The device runtime does, at a fixed
//! address, until [`Device::free`] releases it or the [`Device`] is dropped.
//! Dropping a `Buffer` only drops the view; the allocation stays alive.
//!
//! Mutation discipline:
//! - the host writes through the view before a dispatch
//! - the device writes during [`Device::run`], which holds `&mut` to every bound view
//! - the host reads after `run` returns

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::device::Device;
use crate::error::{AllocationError, ResolveError};
use crate::handle::{BufferHandle, DeviceId};
use crate::runtime::{HostRegion, HOST_ALIGNMENT};

/// Anything that can name a shared buffer for a dispatch.
///
/// # Safety
///
/// While `self` is mutably borrowed, the memory behind the returned handle
/// must not be reachable through any other live reference. [`Device::run`]
/// relies on this to let the device write into it.
pub unsafe trait BufferRef {
    fn buffer_handle(&self) -> BufferHandle;

    /// Device that issued the handle.
    fn device_id(&self) -> DeviceId;
}

// SAFETY: forwarding; the exclusive borrow of `R` is held for as long as ours.
unsafe impl<R: BufferRef + ?Sized> BufferRef for &mut R {
    fn buffer_handle(&self) -> BufferHandle {
        (**self).buffer_handle()
    }

    fn device_id(&self) -> DeviceId {
        (**self).device_id()
    }
}

/// Typed, fixed-length view over one shared allocation.
///
/// The base address, length and stride never change. Only element contents
/// may be mutated, through `DerefMut`.
pub struct Buffer<'d, T> {
    device: DeviceId,
    handle: BufferHandle,
    ptr: NonNull<T>,
    len: usize,
    _device: PhantomData<&'d Device>,
    _elem: PhantomData<T>,
}

// SAFETY: a `Buffer` is the only safe path to its memory, so it behaves like
// `&mut [T]` for thread-safety purposes.
unsafe impl<T: Send> Send for Buffer<'_, T> {}
unsafe impl<T: Sync> Sync for Buffer<'_, T> {}

// SAFETY: the view is the sole safe alias of its allocation and is borrowed
// mutably for the duration of the dispatch.
unsafe impl<T> BufferRef for Buffer<'_, T> {
    fn buffer_handle(&self) -> BufferHandle {
        self.handle
    }

    fn device_id(&self) -> DeviceId {
        self.device
    }
}

impl<'d, T: Pod> Buffer<'d, T> {
    fn empty(device: DeviceId) -> Self {
        Self {
            device,
            handle: BufferHandle::NULL,
            ptr: NonNull::dangling(),
            len: 0,
            _device: PhantomData,
            _elem: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `region` must describe live memory owned by the runtime behind `handle`
    /// that is not reachable through any other live view.
    unsafe fn from_region(
        device: DeviceId,
        handle: BufferHandle,
        region: HostRegion,
    ) -> Result<Self, ResolveError> {
        let element_size = size_of::<T>();
        if region.byte_len % element_size != 0 {
            return Err(ResolveError::Misaligned {
                handle,
                byte_len: region.byte_len,
                element_size,
            });
        }
        if region.base.as_ptr().align_offset(align_of::<T>()) != 0 {
            return Err(ResolveError::Unaligned {
                handle,
                align: align_of::<T>(),
            });
        }

        Ok(Self {
            device,
            handle,
            ptr: region.base.cast::<T>(),
            len: region.byte_len / element_size,
            _device: PhantomData,
            _elem: PhantomData,
        })
    }

    /// Identifier used to bind this buffer in a dispatch.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stride in bytes.
    pub fn element_size(&self) -> usize {
        size_of::<T>()
    }

    pub fn byte_len(&self) -> usize {
        self.len * size_of::<T>()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice::<T, u8>(self)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut::<T, u8>(self)
    }
}

impl<T> Deref for Buffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: `ptr` is aligned and valid for `len` elements (dangling with
        // len 0 for the empty buffer) for as long as the device lives.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for Buffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> fmt::Debug for Buffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("device", &self.device)
            .field("handle", &self.handle)
            .field("len", &self.len)
            .field("element_size", &size_of::<T>())
            .finish()
    }
}

fn check_element<T>() {
    const {
        assert!(size_of::<T>() != 0, "zero-sized buffer elements are not supported");
        assert!(
            align_of::<T>() <= HOST_ALIGNMENT,
            "buffer element alignment exceeds the host allocation alignment"
        );
    }
}

impl Device {
    /// Allocates `element_count` zeroed elements of shared memory.
    ///
    /// A count of zero returns an empty view carrying [`BufferHandle::NULL`]
    /// without calling the runtime allocator.
    pub fn allocate<T: Pod>(&self, element_count: usize) -> Result<Buffer<'_, T>, AllocationError> {
        check_element::<T>();

        if element_count == 0 {
            return Ok(Buffer::empty(self.id()));
        }

        let element_size = size_of::<T>();
        let byte_len = element_count
            .checked_mul(element_size)
            .ok_or(AllocationError::Overflow {
                count: element_count,
                element_size,
            })?;

        let handle = self.runtime().allocate(byte_len)?;
        let region = self
            .runtime()
            .resolve(handle)
            .ok_or(AllocationError::Unresolvable(handle))?;
        debug_assert_eq!(region.byte_len, byte_len);

        // SAFETY: freshly allocated; no other view exists yet.
        let buffer = unsafe { Buffer::from_region(self.id(), handle, region) }
            .map_err(|_| AllocationError::Unresolvable(handle))?;

        log::debug!("allocated {handle}: {element_count} x {element_size} bytes");
        Ok(buffer)
    }

    /// Builds another view over an existing allocation.
    ///
    /// The view spans the whole allocation, reinterpreted as `T`.
    /// [`BufferHandle::NULL`] resolves to an empty view.
    ///
    /// # Safety
    ///
    /// The returned view aliases every other view of `handle`. The caller
    /// must not use two views of one allocation in a way that overlaps a
    /// mutable borrow, must not bind one to a dispatch while the other is
    /// borrowed, and must stop using the view once the allocation is freed.
    /// `handle` must have been issued by this device.
    pub unsafe fn resolve<T: Pod>(&self, handle: BufferHandle) -> Result<Buffer<'_, T>, ResolveError> {
        check_element::<T>();

        if handle.is_null() {
            return Ok(Buffer::empty(self.id()));
        }

        let region = self
            .runtime()
            .resolve(handle)
            .ok_or(ResolveError::UnknownBuffer(handle))?;

        // SAFETY: aliasing is the caller's obligation.
        unsafe { Buffer::from_region(self.id(), handle, region) }
    }

    /// Releases the allocation behind `buffer`.
    ///
    /// Allocations are never reclaimed automatically; this is the only way
    /// to return memory before the device is dropped. Freeing the empty
    /// buffer does nothing. A buffer allocated by another device is
    /// rejected as unknown and left untouched.
    pub fn free<T>(&self, buffer: Buffer<'_, T>) -> Result<(), ResolveError> {
        let Buffer { device, handle, .. } = buffer;

        if handle.is_null() {
            return Ok(());
        }
        if device != self.id() {
            return Err(ResolveError::UnknownBuffer(handle));
        }

        self.runtime().free(handle)?;
        log::debug!("freed {handle}");
        Ok(())
    }
}
