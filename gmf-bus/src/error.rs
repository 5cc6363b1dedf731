//! The error taxonomy shared across every layer of the framework.

use std::fmt;

/// A framework error, classified by kind rather than by the subsystem that raised it.
///
/// Per-call errors return immediately to the caller. Errors observed during an
/// element's `process` are mapped to a job failure, which transitions the element to
/// `ERROR`, aborts sibling buses, and posts an `ERROR` event; `close` is best-effort and
/// never masks an earlier error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `NULL`/empty/malformed input, or a contract violation by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An allocation failed; the caller must tear down any partial state it built.
    #[error("out of memory")]
    OutOfMemory,
    /// A name, URI, or method lookup failed.
    #[error("not found: {0}")]
    NotFound(String),
    /// A capability mismatch at port linking, or an unsupported URI scheme.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// A backing resource (network, disk, codec device) failed.
    #[error("I/O error: {0}")]
    Io(String),
    /// A bus or control wait exceeded its budget.
    #[error("operation timed out")]
    Timeout,
    /// The operation was cancelled by `stop`/`abort`.
    #[error("operation aborted")]
    Aborted,
    /// An internal invariant was broken; the owning pipeline enters `ERROR`.
    #[error("fatal internal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        Error::InvalidArgument(msg.to_string())
    }
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(msg: impl fmt::Display) -> Self {
        Error::NotFound(msg.to_string())
    }
    /// Shorthand for [`Error::NotSupported`].
    pub fn not_supported(msg: impl fmt::Display) -> Self {
        Error::NotSupported(msg.to_string())
    }
    /// Shorthand for [`Error::Io`].
    pub fn io(msg: impl fmt::Display) -> Self {
        Error::Io(msg.to_string())
    }
    /// Shorthand for [`Error::Fatal`].
    pub fn fatal(msg: impl fmt::Display) -> Self {
        Error::Fatal(msg.to_string())
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
