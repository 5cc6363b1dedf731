//! Payload buffers for the Generic Media Framework.
//!
//! A [`Payload`] is the unit that flows through a port: a buffer descriptor with a
//! capacity, a valid size, and an end-of-stream marker. Payloads come in two flavours:
//! owned (a private `Vec<u8>`, used when a port pair does not permit sharing) and shared
//! (an `Arc`-backed slice of a common allocation, used for zero-copy pass-through).
//!
//! The shared flavour is adapted from the classic "disjoint mutable slices of one
//! allocation" trick: each [`shared::SharedBytes`] holds a raw pointer into an `Arc`-kept
//! allocation plus a length, so cloning is a refcount bump rather than a copy, and the
//! allocation is freed only once every slice referencing it has been dropped.
#![forbid(missing_docs)]

pub mod shared;

use shared::SharedBytes;

/// Caller-defined bits carried alongside a payload.
///
/// The framework does not interpret these; elements and applications may agree on a
/// private meaning (e.g. "keyframe", "discontinuity").
pub type PayloadFlags = u32;

/// Backing storage for a [`Payload`].
enum Storage {
    /// A privately owned buffer, used when the port pair does not share.
    Owned(Vec<u8>),
    /// A buffer shared (zero-copy) with one or more other payloads.
    Shared(SharedBytes),
}

/// A buffer descriptor passed through a port.
///
/// Invariant: `valid_size <= capacity` always holds.
pub struct Payload {
    storage: Storage,
    valid_size: usize,
    is_done: bool,
    flags: PayloadFlags,
}

impl Payload {
    /// Allocates a new owned payload with the given capacity, no valid bytes yet.
    pub fn with_capacity(capacity: usize) -> Self {
        Payload {
            storage: Storage::Owned(vec![0u8; capacity]),
            valid_size: 0,
            is_done: false,
            flags: 0,
        }
    }

    /// Wraps an existing owned buffer as a payload, with `valid_size` meaningful bytes.
    ///
    /// # Panics
    /// Panics if `valid_size` exceeds `bytes.len()`.
    pub fn from_owned(bytes: Vec<u8>, valid_size: usize) -> Self {
        assert!(valid_size <= bytes.len(), "valid_size exceeds capacity");
        Payload {
            storage: Storage::Owned(bytes),
            valid_size,
            is_done: false,
            flags: 0,
        }
    }

    /// Wraps a shared buffer as a payload, with `valid_size` meaningful bytes.
    ///
    /// # Panics
    /// Panics if `valid_size` exceeds the shared buffer's length.
    pub fn from_shared(bytes: SharedBytes, valid_size: usize) -> Self {
        assert!(valid_size <= bytes.len(), "valid_size exceeds capacity");
        Payload {
            storage: Storage::Shared(bytes),
            valid_size,
            is_done: false,
            flags: 0,
        }
    }

    /// A zero-length, zero-capacity payload, used to signal end-of-stream with no data.
    pub fn done_marker() -> Self {
        let mut p = Payload::with_capacity(0);
        p.is_done = true;
        p
    }

    /// Total capacity of the underlying buffer.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.len(),
            Storage::Shared(b) => b.len(),
        }
    }

    /// Number of bytes currently meaningful, `0..=capacity()`.
    pub fn valid_size(&self) -> usize {
        self.valid_size
    }

    /// Sets the number of meaningful bytes.
    ///
    /// # Panics
    /// Panics if `n` exceeds `capacity()`.
    pub fn set_valid_size(&mut self, n: usize) {
        assert!(n <= self.capacity(), "valid_size would exceed capacity");
        self.valid_size = n;
    }

    /// Whether this payload carries (or follows) the end of a stream.
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Marks this payload as carrying end-of-stream.
    pub fn set_done(&mut self, done: bool) {
        self.is_done = done;
    }

    /// Caller-defined flags.
    pub fn flags(&self) -> PayloadFlags {
        self.flags
    }

    /// Sets caller-defined flags.
    pub fn set_flags(&mut self, flags: PayloadFlags) {
        self.flags = flags;
    }

    /// True if this payload shares its storage with another (refcount > 1).
    pub fn is_shared(&self) -> bool {
        match &self.storage {
            Storage::Owned(_) => false,
            Storage::Shared(b) => b.share_count() > 1,
        }
    }

    /// Number of live references to the underlying allocation (1 for owned payloads).
    pub fn share_count(&self) -> usize {
        match &self.storage {
            Storage::Owned(_) => 1,
            Storage::Shared(b) => b.share_count(),
        }
    }

    /// The valid bytes, as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        let valid_size = self.valid_size;
        match &self.storage {
            Storage::Owned(v) => &v[..valid_size],
            Storage::Shared(b) => &b[..valid_size],
        }
    }

    /// The valid bytes, as a mutable slice.
    ///
    /// For shared storage this mutates every payload that still references the same
    /// allocation; callers that forward shared payloads downstream must not rely on
    /// exclusive access.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let valid_size = self.valid_size;
        match &mut self.storage {
            Storage::Owned(v) => &mut v[..valid_size],
            Storage::Shared(b) => &mut b[..valid_size],
        }
    }

    /// Produces a second handle onto the same storage (refcount bump, no copy) if this
    /// payload is shared; for owned payloads this instead performs a full copy of the
    /// valid bytes, since ownership of an owned buffer cannot be split.
    pub fn fork(&self) -> Payload {
        match &self.storage {
            Storage::Owned(v) => {
                let mut copy = vec![0u8; v.len()];
                copy[..self.valid_size].copy_from_slice(&v[..self.valid_size]);
                Payload {
                    storage: Storage::Owned(copy),
                    valid_size: self.valid_size,
                    is_done: self.is_done,
                    flags: self.flags,
                }
            }
            Storage::Shared(b) => Payload {
                storage: Storage::Shared(b.clone()),
                valid_size: self.valid_size,
                is_done: self.is_done,
                flags: self.flags,
            },
        }
    }

    /// Whether this payload's storage participates in zero-copy sharing at all (as
    /// opposed to being a privately owned buffer).
    pub fn is_shareable_storage(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }
}
