//! Directional I/O endpoints sitting at the head (reader) or tail (writer) of a
//! pipeline, addressed by URI.

pub mod embed;
pub mod file;
pub mod http;

use std::time::Duration;

use gmf_bus::{Payload, Status};

use crate::error::Result;

pub use embed::{EmbedReader, EmbedTable};
pub use file::{FileReader, FileWriter};
pub use http::{HttpReader, HttpTransport, HttpWriter, InMemoryTransport, NotSupportedTransport};

/// A source or sink at the boundary of a pipeline.
///
/// The pipeline routes a reader's acquired payloads into the head element's in-port and
/// the tail element's released payloads into a writer, through the same acquire/release
/// contract a port uses, so share/copy semantics are uniform across the whole chain.
pub trait IoEndpoint: Send {
    /// Prepares the resource (opens a file, connects a transport, indexes an embed
    /// table entry).
    fn open(&mut self) -> Result<()>;

    /// Seeks to an absolute byte offset, if the backing resource supports it.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::NotSupported`] by default.
    fn seek(&mut self, _position: u64) -> Result<()> {
        Err(crate::error::Error::not_supported("seek is not supported by this endpoint"))
    }

    /// Reads up to `wanted` bytes into a fresh payload.
    fn acquire_read(&mut self, wanted: usize, timeout: Duration) -> Result<Status>;

    /// Advances the read position by the payload's valid size.
    fn release_read(&mut self, payload: Payload, timeout: Duration) -> Result<()>;

    /// Acquires a payload of up to `wanted` bytes to write into.
    fn acquire_write(&mut self, wanted: usize, timeout: Duration) -> Result<Status>;

    /// Writes the payload's valid bytes and advances the write position.
    fn release_write(&mut self, payload: Payload, timeout: Duration) -> Result<()>;

    /// Releases the underlying resource. Best-effort; safe to call more than once.
    fn close(&mut self) -> Result<()>;

    /// The URI this endpoint was opened against.
    fn uri(&self) -> &str;

    /// Total size in bytes, when known in advance (e.g. a file's length; `None` for a
    /// live HTTP stream without a `Content-Length`).
    fn total_size(&self) -> Option<u64>;

    /// The current byte position.
    fn position(&self) -> u64;
}
