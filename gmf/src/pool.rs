//! The factory registry: named recipes for building elements and I/O endpoints, and the
//! pipeline assembler that looks them up, per §4.6.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::io::IoEndpoint;
use crate::pipeline::Pipeline;

/// Builds a fresh [`Element`] from a configuration buffer.
pub type ElementNewFn = Arc<dyn Fn(&[u8]) -> Result<Box<dyn Element>> + Send + Sync>;

/// A named recipe for constructing one kind of element.
#[derive(Clone)]
pub struct ElementFactory {
    tag: String,
    default_config: Vec<u8>,
    new_fn: ElementNewFn,
}

impl ElementFactory {
    /// Creates a factory for elements tagged `tag`. `new_fn` is responsible for giving
    /// the freshly built element whatever in/out ports it needs before returning it.
    pub fn new(tag: impl Into<String>, default_config: impl Into<Vec<u8>>, new_fn: ElementNewFn) -> Self {
        ElementFactory { tag: tag.into(), default_config: default_config.into(), new_fn }
    }

    /// The tag this factory is registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Builds a new element, using `config` if given or the factory's default otherwise.
    pub fn build(&self, config: Option<&[u8]>) -> Result<Box<dyn Element>> {
        (self.new_fn)(config.unwrap_or(&self.default_config))
    }
}

/// Which role an [`IoFactory`] is asked to build: a pipeline's reader or its writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    /// The pipeline's source, at the head of the chain.
    Reader,
    /// The pipeline's sink, at the tail of the chain.
    Writer,
}

/// Builds a fresh [`IoEndpoint`] for a given direction and URI.
pub type IoNewFn = Arc<dyn Fn(IoDirection, &str) -> Result<Box<dyn IoEndpoint>> + Send + Sync>;

/// A named recipe for constructing one URI scheme's I/O backend, in either direction.
/// A factory that only supports one direction should fail the other with
/// [`Error::NotSupported`] (as the `embed` backend does for writing).
#[derive(Clone)]
pub struct IoFactory {
    tag: String,
    new_fn: IoNewFn,
}

impl IoFactory {
    /// Creates a factory for the scheme tagged `tag` (e.g. `"file"`, `"embed"`, `"http"`).
    pub fn new(tag: impl Into<String>, new_fn: IoNewFn) -> Self {
        IoFactory { tag: tag.into(), new_fn }
    }

    /// The tag this factory is registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Builds a new endpoint for `uri` in the given direction.
    pub fn build(&self, direction: IoDirection, uri: &str) -> Result<Box<dyn IoEndpoint>> {
        (self.new_fn)(direction, uri)
    }
}

/// The registry of element and I/O factories a pool assembles pipelines from.
///
/// Registration takes a mutex, matching the component design's note that the pool is
/// "protected by a mutex for registration"; lookups during assembly take the same lock
/// briefly rather than maintaining a separate read path, since registration is rare
/// compared to assembly.
#[derive(Default)]
pub struct Pool {
    elements: Mutex<HashMap<String, ElementFactory>>,
    ios: Mutex<HashMap<String, IoFactory>>,
}

impl Pool {
    /// An empty pool.
    pub fn new() -> Self {
        Pool::default()
    }

    /// Registers an element factory, replacing any prior registration under the same tag.
    pub fn register_element(&self, factory: ElementFactory) {
        self.elements.lock().expect("pool mutex poisoned").insert(factory.tag().to_string(), factory);
    }

    /// Registers an I/O factory, replacing any prior registration under the same tag.
    pub fn register_io(&self, factory: IoFactory) {
        self.ios.lock().expect("pool mutex poisoned").insert(factory.tag().to_string(), factory);
    }

    /// Assembles a pipeline: a reader, a chain of elements built (in order) from
    /// `element_names`, and a writer, linked according to each adjacent pair's
    /// capability intersection.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if any named factory is not registered, or whatever
    /// [`Pipeline`] assembly returns for an incompatible or empty chain.
    pub fn new_pipeline(&self, reader_name: &str, element_names: &[&str], writer_name: &str) -> Result<Pipeline> {
        let reader_factory = self.io_factory(reader_name)?;
        let writer_factory = self.io_factory(writer_name)?;

        let mut elements = Vec::with_capacity(element_names.len());
        for name in element_names {
            let factory = self.element_factory(name)?;
            elements.push(factory.build(None)?);
        }

        Pipeline::assemble(elements, reader_factory, writer_factory)
    }

    fn element_factory(&self, name: &str) -> Result<ElementFactory> {
        self.elements
            .lock()
            .expect("pool mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("element factory '{name}'")))
    }

    fn io_factory(&self, name: &str) -> Result<IoFactory> {
        self.ios
            .lock()
            .expect("pool mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("io factory '{name}'")))
    }
}
