//! An element specialisation carrying still/video frame metadata.

use gmf_bus::{Payload, Status};

use super::{forward_done_marker, Element, ElementBase, ElementState, JobStatus};
use crate::error::Error;
use crate::object::Config;

/// Frame format metadata a pic element exposes (e.g. a scaler reading the upstream
/// resolution before computing its output buffer size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bytes per pixel (e.g. 2 for RGB565, 3 for RGB888).
    pub bytes_per_pixel: u8,
}

impl PicInfo {
    /// The size in bytes of one whole frame at this resolution and format.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }
}

/// A picture/video-processing element: whole frames in, whole frames out. Unlike
/// [`super::AudioElement`], a pic element works in block granularity since a decoder
/// downstream generally cannot act on a partial frame; `process` therefore either moves
/// a whole frame or reports `Truncate` without releasing partial data into the out-port.
pub struct PicElement {
    base: ElementBase,
    info: PicInfo,
}

impl PicElement {
    /// Creates a new pic element with the given frame metadata.
    pub fn new(tag: impl Into<String>, config: impl Into<Config>, info: PicInfo) -> Self {
        PicElement { base: ElementBase::new(tag, config), info }
    }

    /// The frame metadata this element was constructed with.
    pub fn pic_info(&self) -> PicInfo {
        self.info
    }
}

impl Element for PicElement {
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
        let frame_size = self.info.frame_size();
        let in_port = self
            .in_ports()
            .first()
            .ok_or_else(|| Error::fatal("pic element has no input port"))?;

        let out_port = self
            .out_ports()
            .first()
            .ok_or_else(|| Error::fatal("pic element has no output port"))?;

        let payload = match in_port.acquire_read(frame_size, timeout)? {
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
        if payload.valid_size() < frame_size && !is_done {
            in_port.release_read(payload, timeout)?;
            return Ok(JobStatus::Truncate);
        }
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

        if is_done {
            Ok(JobStatus::Done)
        } else {
            Ok(JobStatus::Ok)
        }
    }

    fn close(&mut self) -> crate::error::Result<()> {
        Ok(())
    }
}
