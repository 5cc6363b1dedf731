//! The event type traced through a [`crate::Port`]'s optional [`gmf_logging::Logger`].

/// One acquire/release/abort/reset event observed at a port, for attaching a
/// [`gmf_logging::Logger`] to trace bus activity without coupling the bus
/// implementations themselves to a particular logging destination.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A reader began waiting for up to `wanted` bytes/blocks.
    AcquireRead {
        /// The port's name.
        port: String,
        /// Bytes (or blocks) requested.
        wanted: usize,
    },
    /// A payload of `size` bytes was handed back after reading.
    ReleaseRead {
        /// The port's name.
        port: String,
        /// Valid bytes released.
        size: usize,
    },
    /// A writer began waiting for room to write up to `wanted` bytes/blocks.
    AcquireWrite {
        /// The port's name.
        port: String,
        /// Bytes (or blocks) requested.
        wanted: usize,
    },
    /// A payload of `size` bytes was published.
    ReleaseWrite {
        /// The port's name.
        port: String,
        /// Valid bytes published.
        size: usize,
    },
    /// The port's bus was aborted.
    Abort {
        /// The port's name.
        port: String,
    },
    /// The port's bus was reset for a subsequent run.
    Reset {
        /// The port's name.
        port: String,
    },
}
