//! Port capability flags and the compatibility rule used when linking two ports.

/// How many concurrent logical streams a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one producer/consumer pair.
    Single,
    /// More than one peer may be attached (fan-in/fan-out), e.g. a mixer's inputs.
    Multi,
}

/// Whether a port moves raw bytes or whole fixed-size blocks/frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// An unstructured byte stream (ring-buffer-friendly).
    Byte,
    /// Fixed-size blocks handed over as a unit (block-handoff-friendly).
    Block,
}

/// The capability set a port advertises when it is created.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    /// Single- or multi-peer.
    pub multiplicity: Multiplicity,
    /// Byte- or block-oriented transfer.
    pub granularity: Granularity,
    /// Whether this port is willing to hand over (or receive) a payload by reference
    /// instead of by copy.
    pub shareable: bool,
    /// The element's preferred transfer size: bytes per acquire for `Byte` ports, block
    /// size for `Block` ports.
    pub size_hint: usize,
}

impl Capability {
    /// A byte-oriented, single-peer, non-shareable port with the given size hint.
    pub fn byte(size_hint: usize) -> Self {
        Capability { multiplicity: Multiplicity::Single, granularity: Granularity::Byte, shareable: false, size_hint }
    }

    /// A block-oriented, single-peer port with the given block size, optionally shareable.
    pub fn block(size_hint: usize, shareable: bool) -> Self {
        Capability { multiplicity: Multiplicity::Single, granularity: Granularity::Block, shareable, size_hint }
    }

    /// A block-oriented, multi-peer port (e.g. a fan-in/fan-out junction).
    pub fn multi_block(size_hint: usize, shareable: bool) -> Self {
        Capability { multiplicity: Multiplicity::Multi, granularity: Granularity::Block, shareable, size_hint }
    }
}

/// The outcome of intersecting an out-port's and an in-port's capabilities.
pub struct LinkPlan {
    /// The bus variant the assembler should build for this edge.
    pub variant: BusVariant,
    /// Whether the linked ports will share payload storage (zero-copy) or copy.
    pub shared: bool,
    /// The buffer/transfer size to build the bus with.
    pub size: usize,
}

/// Which [`crate::bus`] implementation a linked edge should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusVariant {
    /// Byte-granular ring buffer.
    Ring,
    /// Fixed-size block handoff, possibly pass-through.
    Block,
    /// Bounded queue of payload descriptors.
    Fifo,
}

/// Intersects two capabilities per the linking rule in the component design: ring for
/// byte+non-shared, block for block-oriented, sharing iff both ends advertise
/// `shareable` with compatible sizes, and an owned intermediate buffer sized to
/// `max(out_size, in_size)` otherwise.
pub fn intersect(out_cap: &Capability, in_cap: &Capability) -> crate::error::Result<LinkPlan> {
    if out_cap.granularity != in_cap.granularity {
        return Err(crate::error::Error::not_supported(format!(
            "granularity mismatch: out={:?} in={:?}",
            out_cap.granularity, in_cap.granularity
        )));
    }

    let shared = out_cap.shareable && in_cap.shareable && out_cap.size_hint == in_cap.size_hint;
    let size = out_cap.size_hint.max(in_cap.size_hint);

    let variant = match out_cap.granularity {
        Granularity::Byte => BusVariant::Ring,
        Granularity::Block if out_cap.multiplicity == Multiplicity::Multi || in_cap.multiplicity == Multiplicity::Multi => {
            BusVariant::Fifo
        }
        Granularity::Block => BusVariant::Block,
    };

    Ok(LinkPlan { variant, shared, size })
}
