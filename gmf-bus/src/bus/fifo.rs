//! A bounded FIFO queue of payload descriptors, for multi-peer junctions.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use gmf_bytes::Payload;

use super::{DataBus, Status};
use crate::error::Result;

struct State {
    queue: VecDeque<Payload>,
    capacity: usize,
    done: bool,
    aborted: bool,
}

/// A bounded queue preserving submission order; unlike [`super::BlockBus`] it admits
/// more than one outstanding payload at a time, which is what a fan-in/fan-out junction
/// needs to avoid forcing every producer to rendezvous with the consumer individually.
pub struct FifoBus {
    item_size: usize,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl FifoBus {
    /// Creates a new FIFO bus holding up to `capacity` payloads of `item_size` bytes.
    pub fn new(capacity: usize, item_size: usize) -> Self {
        FifoBus {
            item_size,
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                capacity,
                done: false,
                aborted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }
}

impl DataBus for FifoBus {
    fn acquire_read(&self, _wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("fifo mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            if let Some(payload) = state.queue.pop_front() {
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
                .expect("fifo mutex poisoned");
            state = guard;
            if result.timed_out() && state.queue.is_empty() && !state.aborted && !state.done {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_read(&self, _payload: Payload, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn acquire_write(&self, wanted: usize, timeout: Duration) -> Result<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("fifo mutex poisoned");
        loop {
            if state.aborted {
                return Ok(Status::Abort);
            }
            if state.queue.len() < state.capacity {
                let size = wanted.max(self.item_size);
                return Ok(Status::Ok(Payload::with_capacity(size)));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Status::Timeout);
            }
            let (guard, result) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .expect("fifo mutex poisoned");
            state = guard;
            if result.timed_out() && state.queue.len() >= state.capacity && !state.aborted {
                return Ok(Status::Timeout);
            }
        }
    }

    fn release_write(&self, payload: Payload, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().expect("fifo mutex poisoned");
        if state.aborted {
            return Err(crate::error::Error::Aborted);
        }
        if state.queue.len() >= state.capacity {
            return Err(crate::error::Error::fatal("fifo release_write on a full queue"));
        }
        if payload.is_done() {
            state.done = true;
        }
        state.queue.push_back(payload);
        self.not_empty.notify_all();
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock().expect("fifo mutex poisoned");
        state.aborted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("fifo mutex poisoned");
        state.aborted = false;
        state.done = false;
        state.queue.clear();
    }
}
