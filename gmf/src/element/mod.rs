//! Processing nodes: a base shared by every specialisation plus the trait the task
//! scheduler and pool drive.

pub mod audio;
pub mod generic;
pub mod pic;

use std::time::Duration;

use gmf_bus::Port;

use crate::error::{Error, Result};
use crate::event::{Event, EventCallback};
use crate::method::MethodRegistry;
use crate::object::{Config, Object};

pub use audio::{AudioElement, SampleInfo};
pub use generic::GenericElement;
pub use pic::{PicElement, PicInfo};

/// An element's lifecycle state, per the component design's state machine:
/// `NONE → OPENING → RUNNING ⇄ PAUSED → FINISHED | STOPPED | ERROR → NONE`.
///
/// Declaration order doubles as the total order the pipeline uses to compute its own
/// state as the supremum over its elements' states (`NONE < OPENING < RUNNING < PAUSED
/// < FINISHED < STOPPED < ERROR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementState {
    /// Freshly created or reset; no worker job scheduled.
    None,
    /// `open` has been scheduled but has not yet returned.
    Opening,
    /// `open` returned `Ok`; `process` jobs are scheduled.
    Running,
    /// Job scheduling is suspended; `resume` returns to `Running`.
    Paused,
    /// `process` returned `Done`; a graceful end-of-stream.
    Finished,
    /// `stop` drained the element and called `close`.
    Stopped,
    /// Some op returned `Fail`; `close` is still invoked.
    Error,
}

impl ElementState {
    fn is_valid_transition(self, to: ElementState) -> bool {
        use ElementState::{Error, Finished, None, Opening, Paused, Running, Stopped};
        matches!(
            (self, to),
            (None, Opening)
                | (Opening, Running)
                | (Opening, Error)
                | (Opening, Stopped)
                | (Running, Paused)
                | (Running, Stopped)
                | (Running, Finished)
                | (Running, Error)
                | (Paused, Running)
                | (Paused, Stopped)
                | (Paused, Error)
                | (Finished, None)
                | (Finished, Stopped)
                | (Stopped, None)
                | (Error, None)
        )
    }
}

/// The outcome of one `process` call, per §4.3: one unit of work per call.
#[derive(Debug)]
pub enum JobStatus {
    /// Progress was made; re-schedule the job.
    Ok,
    /// Produced less than requested; non-terminal, re-schedulable (Design Notes §9
    /// treats `Truncate` and `Ok` identically with respect to termination).
    Truncate,
    /// Graceful end-of-stream; the element transitions to `Finished`.
    Done,
    /// An unrecoverable error; the element transitions to `Error`.
    Fail(Error),
}

/// Propagates end-of-stream to `out_port` by releasing a zero-sized, done-flagged
/// payload, so a downstream element chained on a byte-granular bus (whose acquired
/// payloads never themselves carry the upstream `is_done` flag) still observes
/// `Status::Done` once it has drained what's already buffered. Best-effort: a full or
/// aborted out-port is not an error here, since the element itself is already finishing.
pub(crate) fn forward_done_marker(out_port: &Port, timeout: Duration) -> Result<()> {
    match out_port.acquire_write(0, timeout)? {
        gmf_bus::Status::Ok(mut marker) => {
            marker.set_valid_size(0);
            marker.set_done(true);
            out_port.release_write(marker, timeout)
        }
        gmf_bus::Status::Timeout | gmf_bus::Status::Done | gmf_bus::Status::Abort => Ok(()),
    }
}

/// Fields and behaviour shared by every element specialisation.
pub struct ElementBase {
    object: Object,
    in_ports: Vec<Port>,
    out_ports: Vec<Port>,
    state: ElementState,
    methods: MethodRegistry,
    event_cb: Option<EventCallback>,
    /// The timeout each `acquire_read`/`acquire_write` call uses; the "tick budget" of
    /// §4.7's job scheduler.
    pub tick_timeout: Duration,
}

impl ElementBase {
    /// Creates a base with no ports yet, in state `None`.
    pub fn new(tag: impl Into<String>, config: impl Into<Config>) -> Self {
        ElementBase {
            object: Object::new(tag, config),
            in_ports: Vec::new(),
            out_ports: Vec::new(),
            state: ElementState::None,
            methods: MethodRegistry::new(),
            event_cb: None,
            tick_timeout: Duration::from_millis(50),
        }
    }
}

/// A processing node: `open`/`process`/`close` driven by a [`crate::task::Task`], plus
/// the reflective surface (ports, methods, events) applications drive directly.
pub trait Element: Send {
    /// Shared state every specialisation embeds.
    fn base(&self) -> &ElementBase;
    /// Mutable access to the shared state.
    fn base_mut(&mut self) -> &mut ElementBase;

    /// Prepares the element to run. May not be called again before a clean `close`.
    fn open(&mut self) -> Result<()>;
    /// Performs one unit of work: acquire on in-port(s), produce on out-port(s), release
    /// both. Not called before `open` returned `Ok`.
    fn process(&mut self) -> Result<JobStatus>;
    /// Releases resources acquired by `open`. Called exactly once per matched `open`,
    /// and is best-effort: implementations should not let a teardown error mask an
    /// earlier one.
    fn close(&mut self) -> Result<()>;

    /// The element's tag, as given at construction.
    fn tag(&self) -> &str {
        self.base().object.tag()
    }

    /// The element's current lifecycle state.
    fn state(&self) -> ElementState {
        self.base().state
    }

    /// The element's input ports, in declared order.
    fn in_ports(&self) -> &[Port] {
        &self.base().in_ports
    }

    /// Mutable access to the input ports, e.g. for the assembler to link them.
    fn in_ports_mut(&mut self) -> &mut [Port] {
        &mut self.base_mut().in_ports
    }

    /// Appends a new input port.
    fn add_in_port(&mut self, port: Port) {
        self.base_mut().in_ports.push(port);
    }

    /// The element's output ports, in declared order.
    fn out_ports(&self) -> &[Port] {
        &self.base().out_ports
    }

    /// Mutable access to the output ports.
    fn out_ports_mut(&mut self) -> &mut [Port] {
        &mut self.base_mut().out_ports
    }

    /// Appends a new output port.
    fn add_out_port(&mut self, port: Port) {
        self.base_mut().out_ports.push(port);
    }

    /// The element's method registry.
    fn methods(&self) -> &MethodRegistry {
        &self.base().methods
    }

    /// Mutable access to the method registry, for `register_method`.
    fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.base_mut().methods
    }

    /// Invokes a registered method by name.
    fn invoke_method(&self, name: &str, buffer: &[u8]) -> Result<Vec<u8>> {
        self.methods().invoke(name, buffer)
    }

    /// Subscribes a callback to this element's events, replacing any prior one.
    fn subscribe_event(&mut self, callback: EventCallback) {
        self.base_mut().event_cb = Some(callback);
    }

    /// Posts an event to the subscribed callback, if any. Called from the task thread;
    /// the callback must not block.
    fn report_event(&self, event: &Event) {
        if let Some(cb) = &self.base().event_cb {
            cb(event);
        }
    }

    /// Attempts the transition to `to`, posting a `StateChanged` event on success.
    ///
    /// # Errors
    /// Returns [`Error::Fatal`] if `to` is not reachable from the current state.
    fn set_state(&mut self, to: ElementState) -> Result<()> {
        let from = self.base().state;
        if !from.is_valid_transition(to) {
            return Err(Error::fatal(format!("illegal element state transition {from:?} -> {to:?}")));
        }
        self.base_mut().state = to;
        let tag = self.tag().to_string();
        self.report_event(&Event::state_changed(tag, to.into()));
        Ok(())
    }

    /// Aborts every in/out port's bus, unblocking any job currently waiting in
    /// `process`.
    fn abort_ports(&self) {
        for port in self.in_ports() {
            port.abort();
        }
        for port in self.out_ports() {
            port.abort();
        }
    }

    /// Resets every in/out port's bus for a subsequent run.
    fn reset_ports(&self) {
        for port in self.in_ports() {
            port.reset();
        }
        for port in self.out_ports() {
            port.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn legal_transitions_are_accepted_illegal_ones_rejected() {
        assert!(ElementState::None.is_valid_transition(ElementState::Opening));
        assert!(ElementState::Opening.is_valid_transition(ElementState::Running));
        assert!(ElementState::Running.is_valid_transition(ElementState::Paused));
        assert!(ElementState::Paused.is_valid_transition(ElementState::Running));
        assert!(ElementState::Stopped.is_valid_transition(ElementState::None));
        assert!(!ElementState::None.is_valid_transition(ElementState::Running));
        assert!(!ElementState::Finished.is_valid_transition(ElementState::Running));
    }

    #[test]
    fn supremum_order_matches_component_design() {
        assert!(ElementState::None < ElementState::Opening);
        assert!(ElementState::Opening < ElementState::Running);
        assert!(ElementState::Running < ElementState::Paused);
        assert!(ElementState::Paused < ElementState::Finished);
        assert!(ElementState::Finished < ElementState::Stopped);
        assert!(ElementState::Stopped < ElementState::Error);
    }
}
