//! Byte-granular, blocking, single-producer/single-consumer ring buffer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use gmf_bytes::Payload;

use super::{DataBus, Status};
use crate::error::Result;

struct State {
    buf: VecDeque<u8>,
    capacity: usize,
    done: bool,
    aborted: bool,
}

/// A byte-stream ring buffer: the consumer blocks on empty, the producer blocks on
/// full, and `abort` wakes both sides.
pub struct RingBus {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl RingBus {
    /// Creates a new ring buffer with room for `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RingBus {
            state: Mutex::new(State {
                buf: VecDeque::with_capacity(capacity),
                capacity,
                done: false,
                aborted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }
}

impl DataBus for RingBus {
    fn acquire_read(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("ring mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            if wanted == 0 || !state.buf.is_empty() {
                let n = wanted.min(state.buf.len());
                let bytes: Vec<u8> = state.buf.drain(..n).collect();
                self.not_full.notify_all();
                return Ok(Status::Ok(Payload::from_owned(bytes, n)));
            }
            if state.done {
                return Ok(Status::Done);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Status::Timeout);
            }
            let (guard, result) = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .expect("ring mutex poisoned");
            state = guard;
            if result.timed_out() && state.buf.is_empty() && !state.aborted && !state.done {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_read(&self, _payload: Payload, _timeout: Duration) -> Result<()> {
        // Bytes were already drained out of the ring at acquire time; nothing further
        // to hand back. The parameter is kept for symmetry with the other bus variants.
        Ok(())
    }

    fn acquire_write(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("ring mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            let free = state.capacity - state.buf.len();
            if free > 0 {
                let n = wanted.min(free);
                return Ok(Status::Ok(Payload::with_capacity(n)));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Status::Timeout);
            }
            let (guard, result) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .expect("ring mutex poisoned");
            state = guard;
            if result.timed_out() && state.buf.len() == state.capacity && !state.aborted {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_write(&self, payload: Payload, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().expect("ring mutex poisoned");
        if state.aborted {
            return Err(crate::error::Error::Aborted);
        }
        let free = state.capacity - state.buf.len();
        let n = payload.valid_size().min(free);
        state.buf.extend(&payload.as_slice()[..n]);
        if payload.is_done() {
            state.done = true;
        }
        self.not_empty.notify_all();
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock().expect("ring mutex poisoned");
        state.aborted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("ring mutex poisoned");
        state.aborted = false;
        state.done = false;
        state.buf.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let ring = RingBus::new(16);
        let mut w = match ring.acquire_write(8, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!("expected Ok"),
        };
        w.as_mut_slice()[..5].copy_from_slice(b"hello");
        w.set_valid_size(5);
        ring.release_write(w, Duration::from_millis(10)).unwrap();

        let r = match ring.acquire_read(5, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!("expected Ok"),
        };
        assert_eq!(r.as_slice(), b"hello");
        ring.release_read(r, Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn empty_read_times_out() {
        let ring = RingBus::new(16);
        match ring.acquire_read(4, Duration::from_millis(20)).unwrap() {
            Status::Timeout => {}
            _ => panic!("expected Timeout"),
        }
    }

    #[test]
    fn zero_length_acquire_does_not_block_and_returns_ok() {
        let ring = RingBus::new(16);
        let start = Instant::now();
        let status = ring.acquire_read(0, Duration::from_secs(5)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        match status {
            Status::Ok(p) => assert_eq!(p.valid_size(), 0),
            _ => panic!("zero-length acquire must return Ok with valid_size 0"),
        }
    }

    #[test]
    fn done_after_drain_transitions_to_done() {
        let ring = RingBus::new(16);
        let mut w = match ring.acquire_write(4, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        w.as_mut_slice()[..4].copy_from_slice(b"data");
        w.set_valid_size(4);
        w.set_done(true);
        ring.release_write(w, Duration::from_millis(10)).unwrap();

        let r = match ring.acquire_read(4, Duration::from_millis(10)).unwrap() {
            Status::Ok(p) => p,
            _ => panic!(),
        };
        assert_eq!(r.valid_size(), 4);
        ring.release_read(r, Duration::from_millis(10)).unwrap();

        match ring.acquire_read(4, Duration::from_millis(10)).unwrap() {
            Status::Done => {}
            _ => panic!("expected Done after drain"),
        }
    }

    #[test]
    fn abort_unblocks_pending_reader() {
        use std::sync::Arc;
        let ring = Arc::new(RingBus::new(16));
        let ring2 = ring.clone();
        let handle = std::thread::spawn(move || ring2.acquire_read(4, Duration::from_secs(5)).unwrap());
        std::thread::sleep(Duration::from_millis(50));
        ring.abort();
        match handle.join().unwrap() {
            Status::Abort => {}
            _ => panic!("expected Abort"),
        }
    }

    #[test]
    fn acquire_after_abort_fails_until_reset() {
        let ring = RingBus::new(16);
        ring.abort();
        match ring.acquire_read(1, Duration::from_millis(10)).unwrap() {
            Status::Abort => {}
            _ => panic!("expected Abort"),
        }
        ring.reset();
        match ring.acquire_read(1, Duration::from_millis(10)).unwrap() {
            Status::Timeout => {}
            _ => panic!("expected Timeout after reset (empty, not aborted)"),
        }
    }
}
