//! Filesystem-backed reader and writer, the `file://` scheme's backend.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Duration;

use gmf_bus::{Payload, Status};

use super::IoEndpoint;
use crate::error::{Error, Result};

/// Reads a file from the local filesystem sequentially (or with `seek`).
pub struct FileReader {
    uri: String,
    path: PathBuf,
    file: Option<File>,
    position: u64,
    total_size: Option<u64>,
}

impl FileReader {
    /// Creates a reader for `path`, addressed externally by `uri` (typically
    /// `file://<path>`).
    pub fn new(uri: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        FileReader { uri: uri.into(), path: path.into(), file: None, position: 0, total_size: None }
    }
}

impl IoEndpoint for FileReader {
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| Error::io(format!("open {:?}: {e}", self.path)))?;
        let len = file.metadata().map_err(|e| Error::io(e.to_string()))?.len();
        self.total_size = Some(len);
        self.file = Some(file);
        self.position = 0;
        Ok(())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| Error::fatal("file reader is not open"))?;
        file.seek(SeekFrom::Start(position)).map_err(|e| Error::io(e.to_string()))?;
        self.position = position;
        Ok(())
    }

    fn acquire_read(&mut self, wanted: usize, _timeout: Duration) -> Result<Status> {
        let file = self.file.as_mut().ok_or_else(|| Error::fatal("file reader is not open"))?;
        let mut buf = vec![0u8; wanted];
        let mut filled = 0;
        while filled < wanted {
            let n = file.read(&mut buf[filled..]).map_err(|e| Error::io(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 && wanted > 0 {
            return Ok(Status::Done);
        }
        let mut payload = Payload::from_owned(buf, filled);
        let at_eof = self.total_size.is_some_and(|total| self.position + filled as u64 >= total);
        payload.set_done(at_eof);
        Ok(Status::Ok(payload))
    }

    fn release_read(&mut self, payload: Payload, _timeout: Duration) -> Result<()> {
        self.position += payload.valid_size() as u64;
        Ok(())
    }

    fn acquire_write(&mut self, _wanted: usize, _timeout: Duration) -> Result<Status> {
        Err(Error::not_supported("FileReader does not support writing"))
    }

    fn release_write(&mut self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Err(Error::not_supported("FileReader does not support writing"))
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// Writes to a file on the local filesystem, truncating any existing content on open.
pub struct FileWriter {
    uri: String,
    path: PathBuf,
    file: Option<File>,
    position: u64,
}

impl FileWriter {
    /// Creates a writer for `path`, addressed externally by `uri`.
    pub fn new(uri: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        FileWriter { uri: uri.into(), path: path.into(), file: None, position: 0 }
    }
}

impl IoEndpoint for FileWriter {
    fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::io(format!("open {:?}: {e}", self.path)))?;
        self.file = Some(file);
        self.position = 0;
        Ok(())
    }

    fn acquire_read(&mut self, _wanted: usize, _timeout: Duration) -> Result<Status> {
        Err(Error::not_supported("FileWriter does not support reading"))
    }

    fn release_read(&mut self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Err(Error::not_supported("FileWriter does not support reading"))
    }

    fn acquire_write(&mut self, wanted: usize, _timeout: Duration) -> Result<Status> {
        Ok(Status::Ok(Payload::with_capacity(wanted)))
    }

    fn release_write(&mut self, payload: Payload, _timeout: Duration) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| Error::fatal("file writer is not open"))?;
        file.write_all(payload.as_slice()).map_err(|e| Error::io(e.to_string()))?;
        self.position += payload.valid_size() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        self.file = None;
        Ok(())
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn total_size(&self) -> Option<u64> {
        None
    }

    fn position(&self) -> u64 {
        self.position
    }
}
