use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::AllocationError;

use super::{HostRegion, HOST_ALIGNMENT};

/// Fixed, zeroed host allocation that never moves.
///
/// Capacity is `byte_len` rounded up to [`HOST_ALIGNMENT`], so device copies
/// that need 4-byte multiples can read past the logical end without leaving
/// the allocation. The memory is released on drop.
#[derive(Debug)]
pub struct HostMemory {
    ptr: NonNull<u8>,
    layout: Layout,
    byte_len: usize,
}

// SAFETY: `HostMemory` uniquely owns its allocation. Concurrent access to the
// bytes goes through raw pointers and follows the dispatch ordering contract.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    /// Allocates `byte_len` zeroed bytes.
    pub fn zeroed(byte_len: usize) -> Result<Self, AllocationError> {
        let capacity = byte_len
            .max(1)
            .checked_next_multiple_of(HOST_ALIGNMENT)
            .ok_or(AllocationError::HostOutOfMemory(byte_len))?;
        let layout = Layout::from_size_align(capacity, HOST_ALIGNMENT)
            .map_err(|_| AllocationError::HostOutOfMemory(byte_len))?;

        // SAFETY: `layout` has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AllocationError::HostOutOfMemory(byte_len))?;

        Ok(Self {
            ptr,
            layout,
            byte_len,
        })
    }

    /// Logical length requested at allocation.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Allocated length, a multiple of [`HOST_ALIGNMENT`].
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    pub fn region(&self) -> HostRegion {
        HostRegion {
            base: self.ptr,
            byte_len: self.byte_len,
        }
    }

    /// Borrows the first `len` bytes.
    ///
    /// # Safety
    ///
    /// No mutable view over this memory may be in use for the lifetime of
    /// the returned slice, and `len <= self.capacity()`.
    pub unsafe fn bytes(&self, len: usize) -> &[u8] {
        debug_assert!(len <= self.capacity());
        // SAFETY: in bounds of a live allocation; aliasing upheld by the caller.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), len) }
    }

    /// Overwrites the first `src.len()` bytes.
    ///
    /// # Safety
    ///
    /// No view over this memory may be in use while the copy runs, and
    /// `src.len() <= self.capacity()`.
    pub unsafe fn write(&self, src: &[u8]) {
        debug_assert!(src.len() <= self.capacity());
        // SAFETY: `src` is host memory distinct from this allocation.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr(), src.len()) }
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
