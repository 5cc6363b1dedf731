//! A small, thread-safe, buffered structured-event logger.
//!
//! The framework treats logging and tracing as an explicit service passed through a
//! context rather than a process-wide singleton (see design notes on global state): a
//! [`Registry`] is created once per pool or task set and handed to whichever element or
//! subsystem wants to emit events. Each named stream is independently typed, buffered,
//! and flushed either when full or on an explicit [`Logger::flush`].
//!
//! Unlike the single-threaded, `Rc`-based registry this is descended from, a GMF
//! [`Task`](struct@Task) owns its worker OS thread, so the registry and its loggers are
//! built on `Arc`/`Mutex` to allow events to be logged from any task and drained from
//! any other.
#![forbid(missing_docs)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A registry of named, independently typed logging streams.
pub struct Registry {
    time: Instant,
    map: HashMap<String, Box<dyn Any + Send>>,
}

impl Registry {
    /// Creates a new registry, timestamping every subsequent log entry relative to now.
    pub fn new(time: Instant) -> Self {
        Registry { time, map: HashMap::new() }
    }

    /// Binds a name to a destination action, returning any logger it replaces.
    ///
    /// Events already logged through the superseded binding still reach the old
    /// destination: the logger itself holds the action, not the registry, so replacing
    /// the registry entry does not retroactively redirect an in-flight stream.
    pub fn insert<T: 'static + Send>(
        &mut self,
        name: impl Into<String>,
        action: Box<dyn Fn(&Duration, &[(Duration, T)]) + Send + Sync>,
    ) -> Option<Box<dyn Any + Send>> {
        let logger = Logger::<T>::new(self.time, action);
        self.map.insert(name.into(), Box::new(logger))
    }

    /// Removes a binding, signalling end-of-stream to anyone still holding a clone of
    /// the logger (its destination is simply no longer reachable through this registry;
    /// existing `Logger` handles continue to work until all of them are dropped).
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any + Send>> {
        self.map.remove(name)
    }

    /// Retrieves a clone of a bound logger, if one is registered under `name`.
    pub fn get<T: 'static + Send>(&self, name: &str) -> Option<Logger<T>> {
        self.map.get(name)?.downcast_ref::<Logger<T>>().cloned()
    }
}

/// A cheaply cloneable handle to a buffered, typed logging stream.
pub struct Logger<T> {
    time: Instant,
    action: Arc<dyn Fn(&Duration, &[(Duration, T)]) + Send + Sync>,
    buffer: Arc<Mutex<Vec<(Duration, T)>>>,
}

impl<T> Clone for Logger<T> {
    fn clone(&self) -> Self {
        Logger {
            time: self.time,
            action: self.action.clone(),
            buffer: self.buffer.clone(),
        }
    }
}

const DEFAULT_BUFFER_CAPACITY: usize = 1024;

impl<T> Logger<T> {
    /// Creates a new logger bound to a destination action.
    pub fn new(time: Instant, action: Box<dyn Fn(&Duration, &[(Duration, T)]) + Send + Sync>) -> Self {
        Logger {
            time,
            action: Arc::from(action),
            buffer: Arc::new(Mutex::new(Vec::with_capacity(DEFAULT_BUFFER_CAPACITY))),
        }
    }

    /// Logs an event, timestamped at the moment of the call.
    ///
    /// The event may sit in the buffer until it fills or until [`flush`](Self::flush) is
    /// called; the destination action only ever sees non-decreasing timestamps.
    pub fn log(&self, event: T) {
        let mut buffer = self.buffer.lock().expect("logger buffer mutex poisoned");
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == buffer.capacity() {
            (self.action)(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Flushes any buffered events to the destination action immediately.
    pub fn flush(&self) {
        let mut buffer = self.buffer.lock().expect("logger buffer mutex poisoned");
        (self.action)(&self.time.elapsed(), &buffer[..]);
        buffer.clear();
    }
}
