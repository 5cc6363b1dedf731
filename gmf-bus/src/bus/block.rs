//! Fixed-size block handoff, with an optional zero-copy pass-through mode.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use gmf_bytes::Payload;

use super::{DataBus, Status};
use crate::error::Result;

struct State {
    slot: Option<Payload>,
    write_in_flight: bool,
    done: bool,
    aborted: bool,
}

/// A single-slot block handoff. When `shareable` is true, the producer's payload
/// (typically backed by shared storage) is moved into the slot untouched, so the
/// consumer observes the identical buffer the producer released: zero copy. When
/// `shareable` is false, `release_write` memcpy's the valid bytes into a fresh owned
/// payload before publishing it, matching a port pair that does not both permit sharing.
pub struct BlockBus {
    block_size: usize,
    shareable: bool,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BlockBus {
    /// Creates a new block bus with the given block size and sharing mode.
    pub fn new(block_size: usize, shareable: bool) -> Self {
        BlockBus {
            block_size,
            shareable,
            state: Mutex::new(State { slot: None, write_in_flight: false, done: false, aborted: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }
}

impl DataBus for BlockBus {
    fn acquire_read(&self, _wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("block mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            if let Some(payload) = state.slot.take() {
                self.not_full.notify_all();
                return Ok(Status::Ok(payload));
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
                .expect("block mutex poisoned");
            state = guard;
            if result.timed_out() && state.slot.is_none() && !state.aborted && !state.done {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_read(&self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn acquire_write(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("block mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            if state.slot.is_none() && !state.write_in_flight {
                state.write_in_flight = true;
                let size = wanted.max(self.block_size);
                return Ok(Status::Ok(Payload::with_capacity(size)));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Status::Timeout);
            }
            let (guard, result) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .expect("block mutex poisoned");
            state = guard;
            if result.timed_out() && (state.slot.is_some() || state.write_in_flight) && !state.aborted {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_write(&self, payload: Payload, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().expect("block mutex poisoned");
        if state.aborted {
            return Err(crate::error::Error::Aborted);
        }
        let published = if self.shareable {
            payload
        } else {
            let mut owned = Payload::with_capacity(payload.capacity());
            owned.as_mut_slice()[..payload.valid_size()].copy_from_slice(payload.as_slice());
            owned.set_valid_size(payload.valid_size());
            owned.set_done(payload.is_done());
            owned
        };
        if published.is_done() {
            state.done = true;
        }
        state.slot = Some(published);
        state.write_in_flight = false;
        self.not_empty.notify_all();
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock().expect("block mutex poisoned");
        state.aborted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("block mutex poisoned");
        state.aborted = false;
        state.done = false;
        state.slot = None;
        state.write_in_flight = false;
    }
}
