//! A single in-port/single out-port element: either a byte-for-byte copy (the default)
//! or a zero-copy pass-through, per the "shared-payload chain" scenario in the component
//! design's testable properties.

use gmf_bus::{Payload, Status};

use super::{forward_done_marker, Element, ElementBase, ElementState, JobStatus};
use crate::error::Error;
use crate::object::Config;

/// A generic processing element transforming (or passing through) one input stream to
/// one output stream.
///
/// With `is_pass` set, `process` forwards the payload it acquired from its in-port
/// directly to its out-port's `release_write` without going through `acquire_write`,
/// so a chain of pass-through elements with compatible shareable ports observes the
/// identical underlying buffer end to end. With `is_pass` unset, it acquires a fresh
/// buffer from the out-port and copies the valid bytes into it.
pub struct GenericElement {
    base: ElementBase,
    is_pass: bool,
}

impl GenericElement {
    /// Creates a new generic element. `is_pass` selects the forwarding behaviour.
    pub fn new(tag: impl Into<String>, config: impl Into<Config>, is_pass: bool) -> Self {
        GenericElement { base: ElementBase::new(tag, config), is_pass }
    }
}

impl Element for GenericElement {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn open(&mut self) -> crate::error::Result<()> {
        self.set_state(ElementState::Opening)?;
        self.set_state(ElementState::Running)
    }

    fn process(&mut self) -> crate::error::Result<JobStatus> {
        let timeout = self.base.tick_timeout;
        let in_port = self
            .in_ports()
            .first()
            .ok_or_else(|| Error::fatal("generic element has no input port"))?;
        let wanted = in_port.capability().size_hint;

        let out_port = self
            .out_ports()
            .first()
            .ok_or_else(|| Error::fatal("generic element has no output port"))?;

        let payload = match in_port.acquire_read(wanted, timeout)? {
            Status::Ok(p) => p,
            Status::Done => {
                in_port.release_read(Payload::done_marker(), timeout)?;
                forward_done_marker(out_port, timeout)?;
                return Ok(JobStatus::Done);
            }
            Status::Timeout => return Ok(JobStatus::Ok),
            Status::Abort => return Ok(JobStatus::Fail(Error::Aborted)),
        };

        let truncated = payload.valid_size() < wanted;
        let is_done = payload.is_done();

        if self.is_pass {
            let marker = payload.fork();
            out_port.release_write(payload, timeout)?;
            in_port.release_read(marker, timeout)?;
        } else {
            let mut out_payload = match out_port.acquire_write(payload.valid_size(), timeout)? {
                Status::Ok(p) => p,
                Status::Abort => return Ok(JobStatus::Fail(Error::Aborted)),
                Status::Done | Status::Timeout => return Ok(JobStatus::Ok),
            };
            out_payload.as_mut_slice()[..payload.valid_size()].copy_from_slice(payload.as_slice());
            out_payload.set_valid_size(payload.valid_size());
            out_payload.set_done(is_done);
            out_port.release_write(out_payload, timeout)?;
            in_port.release_read(payload, timeout)?;
        }

        if is_done {
            Ok(JobStatus::Done)
        } else if truncated {
            Ok(JobStatus::Truncate)
        } else {
            Ok(JobStatus::Ok)
        }
    }

    fn close(&mut self) -> crate::error::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use gmf_bus::{link, Capability, Direction, Port};

    fn linked_chain(is_pass: bool, shareable: bool) -> (GenericElement, Port, Port) {
        let mut element = GenericElement::new("copy", Vec::new(), is_pass);
        element.add_in_port(Port::new("in", Direction::In, Capability::block(16, shareable)));
        element.add_out_port(Port::new("out", Direction::Out, Capability::block(16, shareable)));

        let mut feeder_out = Port::new("feeder_out", Direction::Out, Capability::block(16, shareable));
        link(&mut feeder_out, &mut element.in_ports_mut()[0]).unwrap();

        let mut sink_in = Port::new("sink_in", Direction::In, Capability::block(16, shareable));
        link(&mut element.out_ports_mut()[0], &mut sink_in).unwrap();

        (element, feeder_out, sink_in)
    }

    #[test]
    fn copy_mode_produces_independent_buffer() {
        let (mut element, feeder_out, sink_in) = linked_chain(false, false);
        element.open().unwrap();

        let mut w = match feeder_out.acquire_write(16, std::time::Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        w.as_mut_slice()[..4].copy_from_slice(b"data");
        w.set_valid_size(4);
        feeder_out.release_write(w, std::time::Duration::from_millis(50)).unwrap();

        let status = element.process().unwrap();
        assert!(matches!(status, JobStatus::Ok));

        let r = match sink_in.acquire_read(16, std::time::Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(r.as_slice(), b"data");
    }

    #[test]
    fn pass_mode_forwards_identical_buffer() {
        let (mut element, feeder_out, sink_in) = linked_chain(true, true);
        element.open().unwrap();

        let shared = gmf_bytes::shared::SharedBytes::from(vec![0xCDu8; 16]);
        let produced = gmf_bus::Payload::from_shared(shared, 16);
        let produced_ptr = produced.as_slice().as_ptr();
        feeder_out.release_write(produced, std::time::Duration::from_millis(50)).unwrap();

        element.process().unwrap();

        let r = match sink_in.acquire_read(16, std::time::Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(r.as_slice().as_ptr(), produced_ptr);
    }

    #[test]
    fn end_of_stream_transitions_to_done() {
        let (mut element, feeder_out, _sink_in) = linked_chain(false, false);
        element.open().unwrap();

        let mut w = match feeder_out.acquire_write(16, std::time::Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        w.set_valid_size(0);
        w.set_done(true);
        feeder_out.release_write(w, std::time::Duration::from_millis(50)).unwrap();

        let status = element.process().unwrap();
        assert!(matches!(status, JobStatus::Done));
    }

    #[test]
    fn end_of_stream_propagates_through_a_byte_granular_chain() {
        // A ring bus hands back a freshly built payload on every acquire_read, so the
        // payload carrying the final real bytes never itself reports `is_done`; only a
        // later, separate acquire against the drained, done-flagged bus does. A second
        // element chained downstream must still see that signal once its own upstream
        // element observes it.
        use gmf_bus::{link, Capability, Direction, Port};
        use std::time::Duration;

        let mut first = GenericElement::new("dec0", Vec::new(), false);
        first.add_in_port(Port::new("in", Direction::In, Capability::byte(64)));
        first.add_out_port(Port::new("out", Direction::Out, Capability::byte(64)));
        let mut second = GenericElement::new("dec1", Vec::new(), false);
        second.add_in_port(Port::new("in", Direction::In, Capability::byte(64)));
        second.add_out_port(Port::new("out", Direction::Out, Capability::byte(64)));

        let mut feeder_out = Port::new("feeder_out", Direction::Out, Capability::byte(64));
        link(&mut feeder_out, &mut first.in_ports_mut()[0]).unwrap();
        link(&mut first.out_ports_mut()[0], &mut second.in_ports_mut()[0]).unwrap();
        let mut sink_in = Port::new("sink_in", Direction::In, Capability::byte(64));
        link(&mut second.out_ports_mut()[0], &mut sink_in).unwrap();

        first.open().unwrap();
        second.open().unwrap();

        let mut w = match feeder_out.acquire_write(4, Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        w.as_mut_slice()[..4].copy_from_slice(b"data");
        w.set_valid_size(4);
        w.set_done(true);
        feeder_out.release_write(w, Duration::from_millis(50)).unwrap();

        // First tick: both elements drain the real bytes, neither sees done yet.
        assert!(matches!(first.process().unwrap(), JobStatus::Truncate));
        assert!(matches!(second.process().unwrap(), JobStatus::Truncate));

        let r = match sink_in.acquire_read(4, Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(r.as_slice(), b"data");

        // Second tick: the now-empty, done-flagged buses surface Done at each hop.
        assert!(matches!(first.process().unwrap(), JobStatus::Done));
        assert!(matches!(second.process().unwrap(), JobStatus::Done));
    }
}
