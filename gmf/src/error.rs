//! Re-exports the error taxonomy shared with the data-bus layer.
//!
//! The core does not define its own error type: a pool lookup miss, a malformed URI and
//! a bus timeout are all the same kind of thing a caller needs to match on, so the core
//! reuses [`gmf_bus::Error`] rather than wrapping it in another enum at this layer.

pub use gmf_bus::{Error, Result};
