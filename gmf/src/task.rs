//! The worker: one OS thread serially ticking a list of bound pipelines, per §4.7.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::pipeline::Pipeline;

/// The run/pause/stop bits a task's worker thread polls each loop iteration, and that
/// a bound [`Pipeline`] keeps a weak reference to for bookkeeping.
pub(crate) struct ControlBits {
    run: AtomicBool,
    pause: AtomicBool,
    stop: AtomicBool,
}

/// A worker task: a single OS thread that repeatedly ticks every pipeline bound to it,
/// in the order they were bound.
///
/// A task's thread loops: park while not running or paused; otherwise call
/// [`Pipeline::step`] on each bound pipeline in turn. `stop` requests each bound
/// pipeline's own `stop` (abort every bus, run any outstanding `close`, settle in
/// `Stopped`) and then exits the loop for good — a stopped task cannot be restarted.
pub struct Task {
    control: Arc<ControlBits>,
    pipelines: Arc<Mutex<Vec<Pipeline>>>,
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Spawns a worker thread with the given per-tick budget (how long each bound
    /// pipeline's `step` may block acquiring from its reader or an element's in-port).
    pub fn new(tick_budget: Duration) -> Self {
        let control = Arc::new(ControlBits { run: AtomicBool::new(false), pause: AtomicBool::new(false), stop: AtomicBool::new(false) });
        let pipelines: Arc<Mutex<Vec<Pipeline>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_control = control.clone();
        let worker_pipelines = pipelines.clone();
        let handle = thread::Builder::new()
            .name("gmf-task".into())
            .spawn(move || Task::worker_loop(worker_control, worker_pipelines, tick_budget))
            .expect("failed to spawn gmf task thread");

        Task { control, pipelines, handle: Some(handle) }
    }

    fn worker_loop(control: Arc<ControlBits>, pipelines: Arc<Mutex<Vec<Pipeline>>>, tick_budget: Duration) {
        loop {
            if control.stop.load(Ordering::SeqCst) {
                let bound = pipelines.lock().expect("task mutex poisoned");
                for pipeline in bound.iter() {
                    let _ = pipeline.stop();
                }
                return;
            }
            if !control.run.load(Ordering::SeqCst) || control.pause.load(Ordering::SeqCst) {
                thread::park_timeout(Duration::from_millis(10));
                continue;
            }
            {
                let bound = pipelines.lock().expect("task mutex poisoned");
                for pipeline in bound.iter() {
                    let _ = pipeline.step();
                }
            }
            thread::sleep(tick_budget.min(Duration::from_millis(5)));
        }
    }

    /// Binds `pipeline` to this task; one task may serve several pipelines, ticked in
    /// the order they were bound.
    pub fn bind(&self, pipeline: Pipeline) {
        pipeline.bind_task(&self.control);
        self.pipelines.lock().expect("task mutex poisoned").push(pipeline);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Unparks the worker thread and lets every bound pipeline start ticking.
    pub fn run(&self) {
        self.control.run.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Suspends ticking without unbinding anything; [`Task::run`] resumes it.
    pub fn pause(&self) {
        self.control.pause.store(true, Ordering::SeqCst);
    }

    /// Resumes ticking after [`Task::pause`].
    pub fn resume(&self) {
        self.control.pause.store(false, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Requests that every bound pipeline stop and the worker thread exit. Does not
    /// join the thread; use `drop` (or [`Task::join`]) to wait for it.
    pub fn stop(&self) {
        self.control.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Waits for the worker thread to exit after a [`Task::stop`].
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.control.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}
