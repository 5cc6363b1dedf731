//! The assembled chain of elements between one reader and one writer, plus the overall
//! state machine and event fan-out described in §4.8.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use gmf_bus::{link, Direction, Payload, Port, Status};

use crate::element::{Element, ElementState, JobStatus};
use crate::error::{Error, Result};
use crate::event::{Event, EventCallback};
use crate::io::IoEndpoint;
use crate::pool::{IoDirection, IoFactory};
use crate::task::ControlBits;

/// The pipeline's own lifecycle state. It shares [`ElementState`]'s variants and total
/// order: the component design defines pipeline state as the supremum over contained
/// element states under that same order.
pub type PipelineState = ElementState;

struct Inner {
    elements: Vec<Box<dyn Element>>,
    reader_factory: IoFactory,
    writer_factory: IoFactory,
    reader: Option<Box<dyn IoEndpoint>>,
    writer: Option<Box<dyn IoEndpoint>>,
    reader_opened: bool,
    writer_opened: bool,
    reader_done: bool,
    /// An out-port standing in for the reader, linked to the head element's in-port so
    /// the reader's payloads flow through the same acquire/release contract as an
    /// inter-element edge.
    reader_bridge: Port,
    /// An in-port standing in for the writer, linked to the tail element's out-port.
    writer_bridge: Port,
    in_uri: String,
    out_uri: String,
    state: PipelineState,
    run_requested: bool,
    paused: bool,
    stop_requested: bool,
    event_cb: Option<EventCallback>,
    parent: Option<Weak<Mutex<Inner>>>,
    children: Vec<Pipeline>,
    task: Option<Weak<ControlBits>>,
    tick_timeout: Duration,
}

/// A cheaply cloneable handle onto an assembled pipeline.
///
/// Cloning a `Pipeline` clones the handle, not the pipeline: every clone refers to the
/// same underlying chain of elements, so the pool, a bound task and the application all
/// observe one shared state. Parent pipelines hold children by value (owning them),
/// while a child's back-reference to its parent is a [`Weak`] to keep the ownership
/// graph acyclic, per the component design's notes on avoiding cyclic smart-pointer
/// leaks.
#[derive(Clone)]
pub struct Pipeline(Arc<Mutex<Inner>>);

impl Pipeline {
    pub(crate) fn assemble(
        mut elements: Vec<Box<dyn Element>>,
        reader_factory: IoFactory,
        writer_factory: IoFactory,
    ) -> Result<Pipeline> {
        if elements.is_empty() {
            return Err(Error::invalid_argument("a pipeline requires at least one element"));
        }

        for i in 0..elements.len() - 1 {
            let (left, right) = elements.split_at_mut(i + 1);
            let out_port = left[i]
                .out_ports_mut()
                .first_mut()
                .ok_or_else(|| Error::invalid_argument(format!("element '{}' has no output port", left[i].tag())))?;
            let in_port = right[0]
                .in_ports_mut()
                .first_mut()
                .ok_or_else(|| Error::invalid_argument(format!("element '{}' has no input port", right[0].tag())))?;
            link(out_port, in_port)?;
        }

        let head_cap = *elements[0]
            .in_ports()
            .first()
            .ok_or_else(|| Error::invalid_argument(format!("element '{}' has no input port", elements[0].tag())))?
            .capability();
        let mut reader_bridge = Port::new("reader", Direction::Out, head_cap);
        link(&mut reader_bridge, elements[0].in_ports_mut().first_mut().expect("checked above"))?;

        let tail = elements.len() - 1;
        let tail_cap = *elements[tail]
            .out_ports()
            .first()
            .ok_or_else(|| Error::invalid_argument(format!("element '{}' has no output port", elements[tail].tag())))?
            .capability();
        let mut writer_bridge = Port::new("writer", Direction::In, tail_cap);
        link(elements[tail].out_ports_mut().first_mut().expect("checked above"), &mut writer_bridge)?;

        let inner = Inner {
            elements,
            reader_factory,
            writer_factory,
            reader: None,
            writer: None,
            reader_opened: false,
            writer_opened: false,
            reader_done: false,
            reader_bridge,
            writer_bridge,
            in_uri: String::new(),
            out_uri: String::new(),
            state: PipelineState::None,
            run_requested: false,
            paused: false,
            stop_requested: false,
            event_cb: None,
            parent: None,
            children: Vec::new(),
            task: None,
            tick_timeout: Duration::from_millis(50),
        };

        let pipeline = Pipeline(Arc::new(Mutex::new(inner)));
        pipeline.wire_element_events();
        Ok(pipeline)
    }

    fn wire_element_events(&self) {
        let weak = Arc::downgrade(&self.0);
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        for element in inner.elements.iter_mut() {
            let weak = weak.clone();
            element.subscribe_event(Arc::new(move |event: &Event| {
                if let Some(inner_arc) = weak.upgrade() {
                    Pipeline::on_element_event(&inner_arc, event);
                }
            }));
        }
    }

    fn on_element_event(inner_arc: &Arc<Mutex<Inner>>, event: &Event) {
        let mut inner = inner_arc.lock().expect("pipeline mutex poisoned");
        inner.state = compute_state(&inner.elements);
        Self::post_event_locked(&mut inner, event.clone());
    }

    fn post_event_locked(inner: &mut Inner, event: Event) {
        if let Some(cb) = &inner.event_cb {
            cb(&event);
        }
        if let Some(parent_weak) = &inner.parent {
            if let Some(parent_arc) = parent_weak.upgrade() {
                let mut parent_inner = parent_arc.lock().expect("pipeline mutex poisoned");
                Self::post_event_locked(&mut parent_inner, event);
            }
        }
    }

    /// The pipeline's current state: the supremum over its elements' states.
    pub fn state(&self) -> PipelineState {
        self.0.lock().expect("pipeline mutex poisoned").state
    }

    /// Subscribes a callback to this pipeline's events, replacing any prior one.
    pub fn set_event_callback(&self, cb: EventCallback) {
        self.0.lock().expect("pipeline mutex poisoned").event_cb = Some(cb);
    }

    /// Sets the reader's URI, building a fresh reader from the pipeline's reader
    /// factory. Must be called before [`Pipeline::run`].
    pub fn set_in_uri(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        let reader = inner.reader_factory.build(IoDirection::Reader, &uri)?;
        inner.reader = Some(reader);
        inner.reader_opened = false;
        inner.reader_done = false;
        inner.in_uri = uri;
        Ok(())
    }

    /// Sets the writer's URI, building a fresh writer from the pipeline's writer
    /// factory. Must be called before [`Pipeline::run`].
    pub fn set_out_uri(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        let writer = inner.writer_factory.build(IoDirection::Writer, &uri)?;
        inner.writer = Some(writer);
        inner.writer_opened = false;
        inner.out_uri = uri;
        Ok(())
    }

    /// The reader's URI, if set.
    pub fn in_uri(&self) -> String {
        self.0.lock().expect("pipeline mutex poisoned").in_uri.clone()
    }

    /// The writer's URI, if set.
    pub fn out_uri(&self) -> String {
        self.0.lock().expect("pipeline mutex poisoned").out_uri.clone()
    }

    /// The writer's current byte position, for progress reporting.
    pub fn out_position(&self) -> u64 {
        self.0.lock().expect("pipeline mutex poisoned").writer.as_ref().map_or(0, |w| w.position())
    }

    /// Records that `control` now drives this pipeline's ticks. Weakly held: a task
    /// outliving its bound pipelines must not keep them alive.
    pub(crate) fn bind_task(&self, control: &Arc<ControlBits>) {
        self.0.lock().expect("pipeline mutex poisoned").task = Some(Arc::downgrade(control));
    }

    /// Adopts `child` as a cascaded child pipeline: relevant events it raises are
    /// forwarded up to this pipeline's own callback.
    pub fn add_child(&self, child: Pipeline) {
        child.0.lock().expect("pipeline mutex poisoned").parent = Some(Arc::downgrade(&self.0));
        self.0.lock().expect("pipeline mutex poisoned").children.push(child);
    }

    /// Requests that the pipeline start running; the bound task's next tick opens each
    /// element and begins scheduling `process` jobs.
    pub fn run(&self) -> Result<()> {
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        inner.run_requested = true;
        inner.stop_requested = false;
        inner.paused = false;
        Ok(())
    }

    /// Suspends job scheduling; the pipeline remains in its current per-element states.
    pub fn pause(&self) -> Result<()> {
        self.0.lock().expect("pipeline mutex poisoned").paused = true;
        Ok(())
    }

    /// Resumes job scheduling after a [`Pipeline::pause`].
    pub fn resume(&self) -> Result<()> {
        self.0.lock().expect("pipeline mutex poisoned").paused = false;
        Ok(())
    }

    /// Aborts every bus in the pipeline's graph, drains outstanding payloads, calls
    /// `close` on every element and ends in `Stopped`.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        inner.stop_requested = true;
        inner.run_requested = false;
        inner.do_stop()
    }

    /// Returns every element (and the reader/writer bridges) to a pristine, unopened
    /// state, reachable only from a terminal state (`Finished`, `Stopped`, `Error`).
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        inner.do_reset()
    }

    /// Tears the pipeline down: closes every element and the reader/writer, releasing
    /// their resources. The handle remains valid but the pipeline will not run again.
    pub fn destroy(&self) -> Result<()> {
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        let _ = inner.do_stop();
        for element in inner.elements.iter_mut() {
            let _ = element.close();
        }
        if let Some(reader) = inner.reader.as_mut() {
            let _ = reader.close();
        }
        if let Some(writer) = inner.writer.as_mut() {
            let _ = writer.close();
        }
        Ok(())
    }

    /// Advances the pipeline by one scheduler tick: pumps the reader, runs one
    /// `process` per running element, and pumps the writer. Called repeatedly from a
    /// bound [`crate::task::Task`]'s worker thread.
    pub fn step(&self) -> Result<()> {
        let mut inner = self.0.lock().expect("pipeline mutex poisoned");
        if inner.stop_requested {
            return inner.do_stop();
        }
        if !inner.run_requested || inner.paused {
            return Ok(());
        }

        for idx in 0..inner.elements.len() {
            if inner.elements[idx].state() == ElementState::None {
                inner.open_element(idx);
            }
        }

        inner.pump_reader()?;

        for idx in 0..inner.elements.len() {
            if inner.elements[idx].state() == ElementState::Running {
                let status = inner.elements[idx].process();
                inner.handle_job_status(idx, status)?;
            }
        }

        inner.pump_writer()?;
        inner.state = compute_state(&inner.elements);
        Ok(())
    }
}

impl Inner {
    fn open_element(&mut self, idx: usize) {
        if let Err(_err) = self.elements[idx].open() {
            let _ = self.elements[idx].set_state(ElementState::Error);
        }
    }

    fn handle_job_status(&mut self, idx: usize, status: Result<JobStatus>) -> Result<()> {
        match status {
            Ok(JobStatus::Ok) | Ok(JobStatus::Truncate) => Ok(()),
            Ok(JobStatus::Done) => {
                self.elements[idx].set_state(ElementState::Finished)?;
                Ok(())
            }
            Ok(JobStatus::Fail(err)) => {
                let _ = self.elements[idx].set_state(ElementState::Error);
                self.abort_all();
                Err(err)
            }
            Err(err) => {
                let _ = self.elements[idx].set_state(ElementState::Error);
                self.abort_all();
                Err(err)
            }
        }
    }

    fn abort_all(&self) {
        self.reader_bridge.abort();
        self.writer_bridge.abort();
        for element in &self.elements {
            element.abort_ports();
        }
    }

    fn pump_reader(&mut self) -> Result<()> {
        if self.reader_done {
            return Ok(());
        }
        if !self.reader_opened {
            if let Some(reader) = self.reader.as_mut() {
                reader.open()?;
            }
            self.reader_opened = true;
        }
        let wanted = self.reader_bridge.capability().size_hint;
        let status = match self.reader.as_mut() {
            Some(reader) => reader.acquire_read(wanted, self.tick_timeout)?,
            None => return Ok(()),
        };
        match status {
            Status::Ok(payload) => {
                let is_done = payload.is_done();
                let marker = payload.fork();
                self.reader_bridge.release_write(payload, self.tick_timeout)?;
                if let Some(reader) = self.reader.as_mut() {
                    reader.release_read(marker, self.tick_timeout)?;
                }
                if is_done {
                    self.reader_done = true;
                }
            }
            Status::Done => {
                self.reader_done = true;
                self.reader_bridge.release_write(Payload::done_marker(), self.tick_timeout)?;
            }
            Status::Timeout | Status::Abort => {}
        }
        Ok(())
    }

    fn pump_writer(&mut self) -> Result<()> {
        if !self.writer_opened {
            if let Some(writer) = self.writer.as_mut() {
                writer.open()?;
            }
            self.writer_opened = true;
        }
        let wanted = self.writer_bridge.capability().size_hint;
        let status = self.writer_bridge.acquire_read(wanted, self.tick_timeout)?;
        let payload = match status {
            Status::Ok(p) => p,
            Status::Done | Status::Timeout | Status::Abort => return Ok(()),
        };
        if let Some(writer) = self.writer.as_mut() {
            writer.release_write(payload, self.tick_timeout)?;
        }
        Ok(())
    }

    fn do_stop(&mut self) -> Result<()> {
        self.abort_all();
        for element in self.elements.iter_mut() {
            if matches!(element.state(), ElementState::Running | ElementState::Paused | ElementState::Opening) {
                let _ = element.close();
                let _ = element.set_state(ElementState::Stopped);
            }
        }
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.close();
        }
        if let Some(reader) = self.reader.as_mut() {
            let _ = reader.close();
        }
        self.run_requested = false;
        self.stop_requested = false;
        self.state = compute_state(&self.elements);
        Ok(())
    }

    fn do_reset(&mut self) -> Result<()> {
        if !matches!(self.state, ElementState::Finished | ElementState::Stopped | ElementState::Error) {
            return Err(Error::invalid_argument("reset is only valid from a terminal pipeline state"));
        }
        for element in self.elements.iter_mut() {
            element.reset_ports();
            let _ = element.set_state(ElementState::None);
        }
        self.reader_bridge.reset();
        self.writer_bridge.reset();
        self.reader_opened = false;
        self.writer_opened = false;
        self.reader_done = false;
        self.run_requested = false;
        self.paused = false;
        self.stop_requested = false;
        self.state = PipelineState::None;
        Ok(())
    }
}

/// The supremum of `elements`' states under the component design's order, with the
/// two refinements §4.8 calls out explicitly: `Error` dominates everything, and
/// `Finished` is only reached once every element has finished (a lone finished element
/// among still-running peers reads as `Running`, not `Finished`).
fn compute_state(elements: &[Box<dyn Element>]) -> PipelineState {
    if elements.is_empty() {
        return PipelineState::None;
    }
    if elements.iter().any(|e| e.state() == ElementState::Error) {
        return ElementState::Error;
    }
    if elements.iter().all(|e| e.state() == ElementState::Finished) {
        return ElementState::Finished;
    }
    if elements.iter().all(|e| e.state() == ElementState::Stopped) {
        return ElementState::Stopped;
    }
    elements
        .iter()
        .map(|e| match e.state() {
            ElementState::Finished | ElementState::Stopped => ElementState::Running,
            other => other,
        })
        .max()
        .unwrap_or(ElementState::None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::element::GenericElement;
    use crate::io::file::{FileReader, FileWriter};
    use gmf_bus::Capability;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file_factories() -> (IoFactory, IoFactory) {
        let reader_factory = IoFactory::new(
            "file",
            Arc::new(|direction, uri: &str| -> Result<Box<dyn IoEndpoint>> {
                let path = uri.strip_prefix("file://").unwrap_or(uri).to_string();
                match direction {
                    IoDirection::Reader => Ok(Box::new(FileReader::new(uri.to_string(), path))),
                    IoDirection::Writer => Ok(Box::new(FileWriter::new(uri.to_string(), path))),
                }
            }),
        );
        (reader_factory.clone(), reader_factory)
    }

    fn copy_element(tag: &str) -> Box<dyn Element> {
        let mut element: Box<dyn Element> = Box::new(GenericElement::new(tag, Vec::new(), false));
        element.add_in_port(Port::new("in", Direction::In, Capability::byte(4096)));
        element.add_out_port(Port::new("out", Direction::Out, Capability::byte(4096)));
        element
    }

    #[test]
    fn linear_copy_pipeline_reaches_finished_and_copies_bytes() {
        let mut in_path = std::env::temp_dir();
        in_path.push(format!("gmf-pipeline-test-in-{}", std::process::id()));
        std::fs::write(&in_path, b"the quick brown fox").unwrap();
        let mut out_path = std::env::temp_dir();
        out_path.push(format!("gmf-pipeline-test-out-{}", std::process::id()));

        let (reader_factory, writer_factory) = file_factories();
        let elements = vec![copy_element("dec")];
        let pipeline = Pipeline::assemble(elements, reader_factory, writer_factory).unwrap();

        pipeline.set_in_uri(format!("file://{}", in_path.display())).unwrap();
        pipeline.set_out_uri(format!("file://{}", out_path.display())).unwrap();
        pipeline.run().unwrap();

        assert_eq!(pipeline.state(), PipelineState::None);
        for _ in 0..100 {
            pipeline.step().unwrap();
            if pipeline.state() == PipelineState::Finished {
                break;
            }
        }
        assert_eq!(pipeline.state(), PipelineState::Finished);

        let contents = std::fs::read(&out_path).unwrap();
        assert_eq!(contents, b"the quick brown fox");

        std::fs::remove_file(&in_path).unwrap();
        std::fs::remove_file(&out_path).unwrap();
    }

    #[test]
    fn events_are_forwarded_to_subscriber() {
        let (reader_factory, writer_factory) = file_factories();
        let elements = vec![copy_element("dec")];
        let pipeline = Pipeline::assemble(elements, reader_factory, writer_factory).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        pipeline.set_event_callback(Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let mut in_path = std::env::temp_dir();
        in_path.push(format!("gmf-pipeline-test-events-{}", std::process::id()));
        std::fs::write(&in_path, b"x").unwrap();
        let mut out_path = std::env::temp_dir();
        out_path.push(format!("gmf-pipeline-test-events-out-{}", std::process::id()));

        pipeline.set_in_uri(format!("file://{}", in_path.display())).unwrap();
        pipeline.set_out_uri(format!("file://{}", out_path.display())).unwrap();
        pipeline.run().unwrap();
        for _ in 0..10 {
            pipeline.step().unwrap();
        }

        assert!(count.load(Ordering::SeqCst) > 0);

        std::fs::remove_file(&in_path).unwrap();
        let _ = std::fs::remove_file(&out_path);
    }

    #[test]
    fn reset_requires_a_terminal_state() {
        let (reader_factory, writer_factory) = file_factories();
        let elements = vec![copy_element("dec")];
        let pipeline = Pipeline::assemble(elements, reader_factory, writer_factory).unwrap();
        let err = pipeline.reset().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
