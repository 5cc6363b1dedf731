//! The `embed://` scheme's backend: a name-indexed table of flash-embedded assets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gmf_bus::{Payload, Status};

use super::IoEndpoint;
use crate::error::{Error, Result};

/// A registry mapping a name to its embedded bytes, analogous to the source
/// framework's flash-embed table of `{address, size}` entries.
#[derive(Clone, Default)]
pub struct EmbedTable {
    entries: HashMap<String, Arc<[u8]>>,
}

impl EmbedTable {
    /// An empty table.
    pub fn new() -> Self {
        EmbedTable { entries: HashMap::new() }
    }

    /// Registers `name` against `bytes`, replacing any prior entry.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    /// Looks up a name's bytes.
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries.get(name).cloned()
    }
}

/// Reads sequentially from an entry of an [`EmbedTable`], addressed by `embed://<name>`.
pub struct EmbedReader {
    uri: String,
    name: String,
    table: EmbedTable,
    bytes: Option<Arc<[u8]>>,
    position: usize,
}

impl EmbedReader {
    /// Creates a reader that will look `name` up in `table` on [`IoEndpoint::open`].
    pub fn new(uri: impl Into<String>, name: impl Into<String>, table: EmbedTable) -> Self {
        EmbedReader { uri: uri.into(), name: name.into(), table, bytes: None, position: 0 }
    }
}

impl IoEndpoint for EmbedReader {
    fn open(&mut self) -> Result<()> {
        let bytes = self.table.get(&self.name).ok_or_else(|| Error::not_found(format!("embed entry '{}'", self.name)))?;
        self.bytes = Some(bytes);
        self.position = 0;
        Ok(())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.position = position as usize;
        Ok(())
    }

    fn acquire_read(&mut self, wanted: usize, _timeout: Duration) -> Result<Status> {
        let bytes = self.bytes.as_ref().ok_or_else(|| Error::fatal("embed reader is not open"))?;
        if self.position >= bytes.len() {
            return Ok(Status::Done);
        }
        let end = (self.position + wanted).min(bytes.len());
        let slice = &bytes[self.position..end];
        let mut payload = Payload::from_owned(slice.to_vec(), slice.len());
        payload.set_done(end == bytes.len());
        Ok(Status::Ok(payload))
    }

    fn release_read(&mut self, payload: Payload, _timeout: Duration) -> Result<()> {
        self.position += payload.valid_size();
        Ok(())
    }

    fn acquire_write(&mut self, _wanted: usize, _timeout: Duration) -> Result<Status> {
        Err(Error::not_supported("EmbedReader does not support writing"))
    }

    fn release_write(&mut self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Err(Error::not_supported("EmbedReader does not support writing"))
    }

    fn close(&mut self) -> Result<()> {
        self.bytes = None;
        Ok(())
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn total_size(&self) -> Option<u64> {
        self.bytes.as_ref().map(|b| b.len() as u64)
    }

    fn position(&self) -> u64 {
        self.position as u64
    }
}
