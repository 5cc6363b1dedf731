//! An element specialisation carrying PCM stream metadata.

use gmf_bus::{Payload, Status};

use super::{forward_done_marker, Element, ElementBase, ElementState, JobStatus};
use crate::error::Error;
use crate::object::Config;

/// Sample format metadata an audio element exposes to applications (e.g. a resampler
/// reading the upstream rate before computing its ratio).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Samples per second.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits: u8,
    /// Number of interleaved channels.
    pub channels: u8,
}

impl SampleInfo {
    /// Bytes per interleaved frame (`channels * bits / 8`).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.bits as usize / 8
    }
}

/// An audio-processing element: one PCM stream in, one PCM stream out, copying frames
/// byte-for-byte (a concrete decoder/filter/resampler would replace `process`'s copy
/// with real signal processing over the same acquire/release contract).
pub struct AudioElement {
    base: ElementBase,
    info: SampleInfo,
}

impl AudioElement {
    /// Creates a new audio element with the given stream metadata.
    pub fn new(tag: impl Into<String>, config: impl Into<Config>, info: SampleInfo) -> Self {
        AudioElement { base: ElementBase::new(tag, config), info }
    }

    /// The stream metadata this element was constructed with.
    pub fn sample_info(&self) -> SampleInfo {
        self.info
    }
}

impl Element for AudioElement {
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
        let frame_size = self.info.frame_size().max(1);
        let in_port = self
            .in_ports()
            .first()
            .ok_or_else(|| Error::fatal("audio element has no input port"))?;
        let wanted = in_port.capability().size_hint;

        let out_port = self
            .out_ports()
            .first()
            .ok_or_else(|| Error::fatal("audio element has no output port"))?;

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

        let is_done = payload.is_done();
        let usable = payload.valid_size() - (payload.valid_size() % frame_size);
        let mut out_payload = match out_port.acquire_write(usable, timeout)? {
            Status::Ok(p) => p,
            Status::Abort => return Ok(JobStatus::Fail(Error::Aborted)),
            Status::Done | Status::Timeout => return Ok(JobStatus::Ok),
        };
        out_payload.as_mut_slice()[..usable].copy_from_slice(&payload.as_slice()[..usable]);
        out_payload.set_valid_size(usable);
        out_payload.set_done(is_done);
        out_port.release_write(out_payload, timeout)?;

        let truncated = usable < payload.valid_size();
        in_port.release_read(payload, timeout)?;

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

    #[test]
    fn frame_size_accounts_for_channels_and_bit_depth() {
        let info = SampleInfo { sample_rate: 44100, bits: 16, channels: 2 };
        assert_eq!(info.frame_size(), 4);
    }

    #[test]
    fn odd_byte_remainder_is_dropped_not_copied() {
        use gmf_bus::{link, Capability, Direction, Port};
        use std::time::Duration;

        let info = SampleInfo { sample_rate: 44100, bits: 16, channels: 2 };
        let mut element = AudioElement::new("dec", Vec::new(), info);
        element.add_in_port(Port::new("in", Direction::In, Capability::byte(16)));
        element.add_out_port(Port::new("out", Direction::Out, Capability::byte(16)));

        let mut feeder_out = Port::new("feeder_out", Direction::Out, Capability::byte(16));
        link(&mut feeder_out, &mut element.in_ports_mut()[0]).unwrap();
        let mut sink_in = Port::new("sink_in", Direction::In, Capability::byte(16));
        link(&mut element.out_ports_mut()[0], &mut sink_in).unwrap();

        element.open().unwrap();

        let mut w = match feeder_out.acquire_write(9, Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        w.as_mut_slice()[..9].copy_from_slice(&[1u8; 9]);
        w.set_valid_size(9);
        feeder_out.release_write(w, Duration::from_millis(50)).unwrap();

        let status = element.process().unwrap();
        assert!(matches!(status, JobStatus::Truncate));

        let r = match sink_in.acquire_read(16, Duration::from_millis(50)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(r.valid_size(), 8);
    }
}
