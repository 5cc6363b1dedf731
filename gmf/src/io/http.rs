//! The `http://`/`https://` scheme's backend.
//!
//! Network I/O is named in the component design's Out-of-scope list as an external
//! collaborator: the core consumes a narrow [`HttpTransport`] abstraction rather than
//! embedding a client. [`NotSupportedTransport`] is the default (no network stack
//! wired in); [`InMemoryTransport`] is a test double standing in for a real one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gmf_bus::{Payload, Status};

use super::IoEndpoint;
use crate::error::{Error, Result};

/// The narrow interface an HTTP backend must provide: connect once, then stream bytes
/// in one direction.
pub trait HttpTransport: Send {
    /// Issues the request for `uri` and returns the advertised content length, if any.
    fn connect(&mut self, uri: &str) -> Result<Option<u64>>;
    /// Reads up to `buf.len()` bytes, returning the number actually read (0 at EOF).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Writes `buf` to the request body.
    fn write(&mut self, buf: &[u8]) -> Result<()>;
    /// Closes the connection.
    fn close(&mut self) -> Result<()>;
}

/// A transport that refuses every operation; the default when no real HTTP backend has
/// been wired in.
#[derive(Default)]
pub struct NotSupportedTransport;

impl HttpTransport for NotSupportedTransport {
    fn connect(&mut self, _uri: &str) -> Result<Option<u64>> {
        Err(Error::not_supported("no HTTP transport is configured"))
    }
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::not_supported("no HTTP transport is configured"))
    }
    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::not_supported("no HTTP transport is configured"))
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A transport backed by an in-memory byte buffer, standing in for a real network
/// client in tests.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    body: Arc<Mutex<Vec<u8>>>,
    cursor: usize,
    written: Arc<Mutex<Vec<u8>>>,
}

impl InMemoryTransport {
    /// Creates a transport that will serve `body` on read and capture writes into an
    /// independently inspectable buffer.
    pub fn new(body: Vec<u8>) -> Self {
        InMemoryTransport { body: Arc::new(Mutex::new(body)), cursor: 0, written: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Everything written through this transport so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().expect("transport mutex poisoned").clone()
    }
}

impl HttpTransport for InMemoryTransport {
    fn connect(&mut self, _uri: &str) -> Result<Option<u64>> {
        Ok(Some(self.body.lock().expect("transport mutex poisoned").len() as u64))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let body = self.body.lock().expect("transport mutex poisoned");
        let remaining = &body[self.cursor.min(body.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.written.lock().expect("transport mutex poisoned").extend_from_slice(buf);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Reads a resource over HTTP(S) through an injected [`HttpTransport`].
pub struct HttpReader<T: HttpTransport> {
    uri: String,
    transport: T,
    total_size: Option<u64>,
    position: u64,
}

impl<T: HttpTransport> HttpReader<T> {
    /// Creates a reader that will call `transport.connect` on [`IoEndpoint::open`].
    pub fn new(uri: impl Into<String>, transport: T) -> Self {
        HttpReader { uri: uri.into(), transport, total_size: None, position: 0 }
    }
}

impl<T: HttpTransport> IoEndpoint for HttpReader<T> {
    fn open(&mut self) -> Result<()> {
        self.total_size = self.transport.connect(&self.uri)?;
        self.position = 0;
        Ok(())
    }

    fn acquire_read(&mut self, wanted: usize, _timeout: Duration) -> Result<Status> {
        let mut buf = vec![0u8; wanted];
        let n = self.transport.read(&mut buf)?;
        if n == 0 {
            return Ok(Status::Done);
        }
        let mut payload = Payload::from_owned(buf, n);
        let at_eof = self.total_size.is_some_and(|total| self.position + n as u64 >= total);
        payload.set_done(at_eof);
        Ok(Status::Ok(payload))
    }

    fn release_read(&mut self, payload: Payload, _timeout: Duration) -> Result<()> {
        self.position += payload.valid_size() as u64;
        Ok(())
    }

    fn acquire_write(&mut self, _wanted: usize, _timeout: Duration) -> Result<Status> {
        Err(Error::not_supported("HttpReader does not support writing"))
    }

    fn release_write(&mut self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Err(Error::not_supported("HttpReader does not support writing"))
    }

    fn close(&mut self) -> Result<()> {
        self.transport.close()
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

/// Writes a request body over HTTP(S) through an injected [`HttpTransport`].
pub struct HttpWriter<T: HttpTransport> {
    uri: String,
    transport: T,
    position: u64,
}

impl<T: HttpTransport> HttpWriter<T> {
    /// Creates a writer that will call `transport.connect` on [`IoEndpoint::open`].
    pub fn new(uri: impl Into<String>, transport: T) -> Self {
        HttpWriter { uri: uri.into(), transport, position: 0 }
    }
}

impl<T: HttpTransport> IoEndpoint for HttpWriter<T> {
    fn open(&mut self) -> Result<()> {
        self.transport.connect(&self.uri)?;
        self.position = 0;
        Ok(())
    }

    fn acquire_read(&mut self, _wanted: usize, _timeout: Duration) -> Result<Status> {
        Err(Error::not_supported("HttpWriter does not support reading"))
    }

    fn release_read(&mut self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Err(Error::not_supported("HttpWriter does not support reading"))
    }

    fn acquire_write(&mut self, wanted: usize, _timeout: Duration) -> Result<Status> {
        Ok(Status::Ok(Payload::with_capacity(wanted)))
    }

    fn release_write(&mut self, payload: Payload, _timeout: Duration) -> Result<()> {
        self.transport.write(payload.as_slice())?;
        self.position += payload.valid_size() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.transport.close()
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn not_supported_transport_fails_to_connect() {
        let mut reader = HttpReader::new("http://example/missing", NotSupportedTransport);
        let err = reader.open().unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn in_memory_transport_round_trips_a_read() {
        let mut reader = HttpReader::new("http://example/asset", InMemoryTransport::new(b"payload-bytes".to_vec()));
        reader.open().unwrap();
        assert_eq!(reader.total_size(), Some(13));

        let payload = match reader.acquire_read(100, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(payload.as_slice(), b"payload-bytes");
        assert!(payload.is_done());
    }

    #[test]
    fn in_memory_transport_captures_writes() {
        let transport = InMemoryTransport::default();
        let mut writer = HttpWriter::new("http://example/upload", transport.clone());
        writer.open().unwrap();
        let mut payload = match writer.acquire_write(5, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        payload.as_mut_slice().copy_from_slice(b"abcde");
        payload.set_valid_size(5);
        writer.release_write(payload, Duration::from_millis(10)).unwrap();
        assert_eq!(transport.written(), b"abcde");
    }
}
