//! Data bus variants: the queue/ring/block mechanisms underlying a [`crate::Port`].
//!
//! Every variant offers the same acquire/release contract: `acquire_read`/`acquire_write`
//! hand the caller exclusive ownership of a [`gmf_bytes::Payload`], and the matching
//! `release_read`/`release_write` gives control back to the bus. `abort` unblocks every
//! pending acquire with [`Status::Abort`]; acquires fail the same way until `reset`.

mod block;
mod fifo;
mod ring;

pub use block::BlockBus;
pub use fifo::FifoBus;
pub use ring::RingBus;

use gmf_bytes::Payload;
use std::time::Duration;

use crate::error::Result;

/// The non-error outcomes of an `acquire_*` call.
pub enum Status {
    /// A payload is ready; for byte buses `valid_size` may be less than requested.
    Ok(Payload),
    /// The stream has ended (a producer released a payload with `is_done` set, and all
    /// data preceding it has been drained).
    Done,
    /// No payload became available before the timeout elapsed.
    Timeout,
    /// The bus was aborted while this call was blocked or about to block.
    Abort,
}

/// The common contract implemented by every data bus variant.
///
/// Implementations guarantee FIFO ordering within the bus, at most one concurrent
/// reader and at most one concurrent writer, and that no payload is observed twice or
/// lost across a successful acquire/release pair.
pub trait DataBus: Send + Sync {
    /// Acquires up to `wanted` bytes/one block for reading, blocking up to `timeout`.
    fn acquire_read(&self, wanted: usize, timeout: Duration) -> Result<Status>;
    /// Returns a payload previously obtained from `acquire_read`.
    fn release_read(&self, payload: Payload, timeout: Duration) -> Result<()>;
    /// Acquires a payload to write into, blocking up to `timeout` if the bus is full.
    fn acquire_write(&self, wanted: usize, timeout: Duration) -> Result<Status>;
    /// Publishes a payload previously obtained from `acquire_write`.
    fn release_write(&self, payload: Payload, timeout: Duration) -> Result<()>;
    /// Unblocks every pending acquire with [`Status::Abort`]; further acquires fail the
    /// same way until [`DataBus::reset`].
    fn abort(&self);
    /// Clears the aborted and done flags and discards any buffered data, for re-run.
    fn reset(&self);
}
