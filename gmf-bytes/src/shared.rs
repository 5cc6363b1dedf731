//! An `Arc`-backed mutable byte slice carved out of a common allocation.
//!
//! Adapted from the `bytes::arc` pattern: a [`SharedBytes`] is a pointer plus a length
//! into an allocation kept alive by an `Arc`. Cloning a `SharedBytes` is a refcount bump,
//! not a copy, which is exactly the zero-copy pass-through contract a `block`-variant
//! [`crate`]-level bus needs between two ports that both advertise `shareable`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A byte slice backed by a shared allocation; clone to share, drop to release a share.
pub struct SharedBytes {
    /// Pointer to the start of this slice (not necessarily the start of the allocation).
    ptr: *mut u8,
    /// Length of this slice.
    len: usize,
    /// Keeps the backing allocation alive for as long as any slice references it.
    allocation: Arc<Vec<u8>>,
}

// SAFETY: each `SharedBytes` addresses a disjoint or fully-overlapping (clone) range of
// the allocation; the allocation itself is never moved once placed in the `Arc`, and
// access to overlapping ranges is the caller's responsibility exactly as for `&mut [u8]`
// aliasing in general. The pointer is only ever dereferenced while `allocation` is alive.
unsafe impl Send for SharedBytes {}
unsafe impl Sync for SharedBytes {}

impl SharedBytes {
    /// Wraps a freshly allocated buffer as a shared slice covering the whole thing.
    pub fn from(mut bytes: Vec<u8>) -> SharedBytes {
        let ptr = bytes.as_mut_ptr();
        let len = bytes.len();
        SharedBytes {
            ptr,
            len,
            allocation: Arc::new(bytes),
        }
    }

    /// Length of this slice.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if this slice is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live handles (including this one) referencing the allocation.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.allocation)
    }

    /// Splits off `[0, index)` into a new `SharedBytes`, leaving `self` as `[index, len)`.
    ///
    /// # Panics
    /// Panics if `index > self.len()`.
    pub fn extract_to(&mut self, index: usize) -> SharedBytes {
        assert!(index <= self.len, "split index out of range");
        let result = SharedBytes {
            ptr: self.ptr,
            len: index,
            allocation: self.allocation.clone(),
        };
        // SAFETY: `index <= self.len`, so the new pointer stays within the allocation.
        self.ptr = unsafe { self.ptr.add(index) };
        self.len -= index;
        result
    }

    /// Recovers the underlying allocation if this is the only remaining handle.
    pub fn try_recover(self) -> Result<Vec<u8>, SharedBytes> {
        match Arc::try_unwrap(self.allocation) {
            Ok(bytes) => Ok(bytes),
            Err(allocation) => Err(SharedBytes {
                ptr: self.ptr,
                len: self.len,
                allocation,
            }),
        }
    }
}

impl Clone for SharedBytes {
    fn clone(&self) -> Self {
        SharedBytes {
            ptr: self.ptr,
            len: self.len,
            allocation: self.allocation.clone(),
        }
    }
}

impl Deref for SharedBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr..ptr+len` is within `allocation`, which outlives this slice.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl DerefMut for SharedBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `Deref`; exclusive access is the caller's responsibility when a
        // slice is known to be shared (mirrors `&mut [u8]` aliasing rules generally).
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}
