//! The Generic Media Framework core: a small, pluggable runtime for chaining
//! processing elements between a reader and a writer.
//!
//! The crate is layered the way the component design separates its concerns:
//!
//! - [`gmf_bytes`] and [`gmf_bus`] (separate crates this one depends on) provide the
//!   zero-copy payload representation and the data bus/port linking machinery.
//! - [`element`] builds processing nodes (and the three concrete specialisations:
//!   generic copy/pass-through, frame-aligned audio, whole-frame picture) on top of
//!   those ports.
//! - [`io`] provides the reader/writer endpoints at the edges of a pipeline.
//! - [`pool`] is the factory registry pipelines are assembled from.
//! - [`pipeline`] is the assembled chain, its state machine and event fan-out.
//! - [`task`] is the worker thread that drives a pipeline's `process` jobs.
//! - [`method`] is the reflective, typed get/set registry elements expose.
//! - [`uri`] parses the addresses [`io::IoEndpoint`]s are built from.
#![forbid(missing_docs)]

pub mod element;
pub mod error;
pub mod event;
pub mod io;
pub mod method;
pub mod object;
pub mod pipeline;
pub mod pool;
pub mod task;
pub mod uri;

pub use element::{Element, ElementBase, ElementState, JobStatus};
pub use error::{Error, Result};
pub use event::{Event, EventCallback, EventType, SubState};
pub use io::IoEndpoint;
pub use method::{ArgDescriptor, ArgEntry, ArgType, ArgValue, MethodRegistry};
pub use object::{Config, Object};
pub use pipeline::{Pipeline, PipelineState};
pub use pool::{ElementFactory, IoDirection, IoFactory, Pool};
pub use task::Task;
pub use uri::Uri;
