//! Ports: named bus endpoints on an element, mediating acquire/release between peers.

use std::sync::Arc;
use std::time::Duration;

use gmf_logging::Logger;

use crate::bus::{BlockBus, DataBus, FifoBus, RingBus, Status};
use crate::capability::{intersect, BusVariant, Capability};
use crate::error::{Error, Result};
use crate::log::BusEvent;

/// Whether a port is an element's input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Consumes payloads.
    In,
    /// Produces payloads.
    Out,
}

/// A named bus endpoint on an element.
///
/// A port has no peer until [`link`] connects it to a bus shared with exactly one other
/// port (for `Single` multiplicity) or several (for `Multi`). Acquiring or releasing
/// before linking is a caller error.
pub struct Port {
    name: String,
    direction: Direction,
    capability: Capability,
    bus: Option<Arc<dyn DataBus>>,
    logger: Option<Logger<BusEvent>>,
}

impl Port {
    /// Creates an unlinked port with the given name, direction and capability.
    pub fn new(name: impl Into<String>, direction: Direction, capability: Capability) -> Self {
        Port { name: name.into(), direction, capability, bus: None, logger: None }
    }

    /// Attaches a logger tracing this port's acquire/release/abort/reset activity as
    /// [`BusEvent`]s. Replaces any logger attached previously.
    pub fn with_logger(mut self, logger: Logger<BusEvent>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The port's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The port's declared capability.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Whether this port has been linked to a bus.
    pub fn is_linked(&self) -> bool {
        self.bus.is_some()
    }

    /// Attaches an already-built bus to this port (used by the assembler after
    /// [`link`] constructs the shared bus for a pair of ports).
    pub fn attach(&mut self, bus: Arc<dyn DataBus>) {
        self.bus = Some(bus);
    }

    fn bus(&self) -> Result<&Arc<dyn DataBus>> {
        self.bus.as_ref().ok_or_else(|| Error::invalid_argument(format!("port '{}' is not linked", self.name)))
    }

    /// Acquires a payload for reading. Only meaningful on an `In` port.
    pub fn acquire_read(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        debug_assert_eq!(self.direction, Direction::In, "acquire_read on an Out port");
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::AcquireRead { port: self.name.clone(), wanted });
        }
        self.bus()?.acquire_read(wanted, timeout)
    }

    /// Returns a payload previously obtained from [`Port::acquire_read`].
    pub fn release_read(&self, payload: gmf_bytes::Payload, timeout: Duration) -> Result<()> {
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::ReleaseRead { port: self.name.clone(), size: payload.valid_size() });
        }
        self.bus()?.release_read(payload, timeout)
    }

    /// Acquires a payload for writing. Only meaningful on an `Out` port.
    pub fn acquire_write(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        debug_assert_eq!(self.direction, Direction::Out, "acquire_write on an In port");
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::AcquireWrite { port: self.name.clone(), wanted });
        }
        self.bus()?.acquire_write(wanted, timeout)
    }

    /// Publishes a payload previously obtained from [`Port::acquire_write`].
    pub fn release_write(&self, payload: gmf_bytes::Payload, timeout: Duration) -> Result<()> {
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::ReleaseWrite { port: self.name.clone(), size: payload.valid_size() });
        }
        self.bus()?.release_write(payload, timeout)
    }

    /// Aborts the underlying bus, unblocking any peer waiting on an acquire.
    pub fn abort(&self) {
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::Abort { port: self.name.clone() });
        }
        if let Some(bus) = &self.bus {
            bus.abort();
        }
    }

    /// Resets the underlying bus for a subsequent run.
    pub fn reset(&self) {
        if let Some(logger) = &self.logger {
            logger.log(BusEvent::Reset { port: self.name.clone() });
        }
        if let Some(bus) = &self.bus {
            bus.reset();
        }
    }

    /// Flushes this port's attached logger, if any, forcing buffered events to their
    /// destination immediately instead of waiting for the buffer to fill.
    pub fn flush_logger(&self) {
        if let Some(logger) = &self.logger {
            logger.flush();
        }
    }
}

/// Resolves the capability intersection of `out_port` and `in_port`, builds the
/// resulting bus, and attaches it to both ports.
///
/// An attempt to link incompatible capabilities fails with [`Error::NotSupported`] and
/// leaves both ports unlinked.
pub fn link(out_port: &mut Port, in_port: &mut Port) -> Result<()> {
    if out_port.direction != Direction::Out {
        return Err(Error::invalid_argument("link: first port must be an Out port"));
    }
    if in_port.direction != Direction::In {
        return Err(Error::invalid_argument("link: second port must be an In port"));
    }

    let plan = intersect(&out_port.capability, &in_port.capability)?;
    let bus: Arc<dyn DataBus> = match plan.variant {
        BusVariant::Ring => Arc::new(RingBus::new(plan.size)),
        BusVariant::Block => Arc::new(BlockBus::new(plan.size, plan.shared)),
        BusVariant::Fifo => Arc::new(FifoBus::new(4, plan.size)),
    };

    out_port.attach(bus.clone());
    in_port.attach(bus);
    Ok(())
}
