//! Data bus, port, and payload-sharing primitives for the Generic Media Framework.
//!
//! This crate is the "data bus" layer described in the framework's component design: it
//! defines the [`bus::DataBus`] contract and its three variants (ring, block, fifo), the
//! [`Port`] type that mediates acquire/release between two linked ports, and the
//! capability-intersection rule used when the pipeline assembler links an element's
//! out-port to the next element's in-port.
//!
//! It depends on `gmf-bytes` for the payload representation and `gmf-logging` for the
//! buffered event logger used to trace acquire/release/abort activity.
#![forbid(missing_docs)]

pub mod bus;
pub mod capability;
pub mod error;
pub mod log;
pub mod port;

pub use bus::{DataBus, Status};
pub use capability::{intersect, BusVariant, Capability, Granularity, LinkPlan, Multiplicity};
pub use error::{Error, Result};
pub use log::BusEvent;
pub use port::{link, Direction, Port};

pub use gmf_bytes::Payload;
