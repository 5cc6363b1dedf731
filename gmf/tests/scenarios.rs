//! End-to-end coverage of the six concrete scenarios the component design calls out:
//! linear decode to completion, pause/resume equivalence to stop-at-quiescence, a
//! shared-payload pass-through chain, a capability-mismatch copy boundary, a method
//! round-trip through a nested descriptor, and URI parsing.
//!
//! Each test builds real objects (temp files, real pipelines) rather than mocking the
//! crate's own types, matching the unit-test style used throughout the crate's modules.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gmf::element::{AudioElement, ElementState, GenericElement, SampleInfo};
use gmf::io::file::{FileReader, FileWriter};
use gmf::method::{encode, ArgDescriptor, ArgEntry, ArgType, ArgValue};
use gmf::pool::{ElementFactory, IoDirection, IoFactory, Pool};
use gmf::uri;
use gmf::{Error, MethodRegistry};
use gmf_bus::{link, Capability, Direction, Port};

fn temp_path(label: &str) -> std::path::PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("gmf-scenario-{label}-{}-{:?}", std::process::id(), thread::current().id()));
    p
}

fn file_io_factory() -> IoFactory {
    IoFactory::new(
        "file",
        Arc::new(|direction, uri: &str| -> gmf::Result<Box<dyn gmf::IoEndpoint>> {
            let path = uri.strip_prefix("file://").unwrap_or(uri).to_string();
            match direction {
                IoDirection::Reader => Ok(Box::new(FileReader::new(uri.to_string(), path))),
                IoDirection::Writer => Ok(Box::new(FileWriter::new(uri.to_string(), path))),
            }
        }),
    )
}

fn copy_element_factory() -> ElementFactory {
    ElementFactory::new(
        "dec",
        Vec::new(),
        Arc::new(|config: &[u8]| -> gmf::Result<Box<dyn gmf::Element>> {
            let mut element: Box<dyn gmf::Element> = Box::new(GenericElement::new("dec", config.to_vec(), false));
            element.add_in_port(Port::new("in", Direction::In, Capability::byte(4096)));
            element.add_out_port(Port::new("out", Direction::Out, Capability::byte(4096)));
            Ok(element)
        }),
    )
}

// 1. Linear decode: file -> dec -> dec -> dec -> file, run to completion.
#[test]
fn linear_decode_reaches_finished_with_matching_sizes() {
    let in_path = temp_path("linear-in");
    let out_path = temp_path("linear-out");
    std::fs::write(&in_path, b"the quick brown fox jumps over the lazy dog").unwrap();

    let pool = Pool::new();
    pool.register_io(file_io_factory());
    pool.register_element(copy_element_factory());

    let pipeline = pool.new_pipeline("file", &["dec", "dec", "dec"], "file").unwrap();
    assert_eq!(pipeline.state(), ElementState::None);

    pipeline.set_in_uri(format!("file://{}", in_path.display())).unwrap();
    pipeline.set_out_uri(format!("file://{}", out_path.display())).unwrap();
    pipeline.run().unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while pipeline.state() != ElementState::Finished && std::time::Instant::now() < deadline {
        pipeline.step().unwrap();
    }
    assert_eq!(pipeline.state(), ElementState::Finished);

    let written = std::fs::read(&out_path).unwrap();
    let original = std::fs::read(&in_path).unwrap();
    assert_eq!(written, original);
    assert_eq!(pipeline.out_position(), original.len() as u64);

    std::fs::remove_file(&in_path).unwrap();
    std::fs::remove_file(&out_path).unwrap();
}

// 2. Pause/resume: running, pausing and resuming must not duplicate or drop bytes, and
// a subsequent stop settles in Stopped just as an immediate stop would.
#[test]
fn pause_then_resume_does_not_duplicate_bytes() {
    let in_path = temp_path("pause-in");
    let out_path = temp_path("pause-out");
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&in_path, &payload).unwrap();

    let pool = Pool::new();
    pool.register_io(file_io_factory());
    pool.register_element(copy_element_factory());
    let pipeline = pool.new_pipeline("file", &["dec"], "file").unwrap();
    pipeline.set_in_uri(format!("file://{}", in_path.display())).unwrap();
    pipeline.set_out_uri(format!("file://{}", out_path.display())).unwrap();
    pipeline.run().unwrap();

    let mut last_position = 0u64;
    for _ in 0..5 {
        pipeline.step().unwrap();
        let position = pipeline.out_position();
        assert!(position >= last_position, "writer position must be monotone");
        last_position = position;
    }

    pipeline.pause().unwrap();
    for _ in 0..3 {
        pipeline.step().unwrap();
    }
    let paused_position = pipeline.out_position();

    pipeline.resume().unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while pipeline.state() != ElementState::Finished && std::time::Instant::now() < deadline {
        pipeline.step().unwrap();
    }
    assert_eq!(pipeline.state(), ElementState::Finished);
    assert!(pipeline.out_position() >= paused_position);

    let written = std::fs::read(&out_path).unwrap();
    assert_eq!(written, payload, "no byte may be duplicated or dropped across a pause/resume");

    pipeline.stop().unwrap();
    assert_eq!(pipeline.state(), ElementState::Stopped);

    std::fs::remove_file(&in_path).unwrap();
    std::fs::remove_file(&out_path).unwrap();
}

// 3. Shared-payload chain: three is_pass elements with identical shareable block ports
// observe the same underlying buffer end to end.
#[test]
fn shared_payload_chain_observes_identical_buffer() {
    const BLOCK: usize = 10 * 1024;

    let mut feeder_out = Port::new("feeder", Direction::Out, Capability::block(BLOCK, true));
    let mut a = GenericElement::new("a", Vec::new(), true);
    a.add_in_port(Port::new("a_in", Direction::In, Capability::block(BLOCK, true)));
    a.add_out_port(Port::new("a_out", Direction::Out, Capability::block(BLOCK, true)));
    let mut b = GenericElement::new("b", Vec::new(), true);
    b.add_in_port(Port::new("b_in", Direction::In, Capability::block(BLOCK, true)));
    b.add_out_port(Port::new("b_out", Direction::Out, Capability::block(BLOCK, true)));
    let mut c = GenericElement::new("c", Vec::new(), true);
    c.add_in_port(Port::new("c_in", Direction::In, Capability::block(BLOCK, true)));
    c.add_out_port(Port::new("c_out", Direction::Out, Capability::block(BLOCK, true)));
    let mut sink_in = Port::new("sink", Direction::In, Capability::block(BLOCK, true));

    link(&mut feeder_out, &mut a.in_ports_mut()[0]).unwrap();
    link(&mut a.out_ports_mut()[0], &mut b.in_ports_mut()[0]).unwrap();
    link(&mut b.out_ports_mut()[0], &mut c.in_ports_mut()[0]).unwrap();
    link(&mut c.out_ports_mut()[0], &mut sink_in).unwrap();

    a.open().unwrap();
    b.open().unwrap();
    c.open().unwrap();

    let shared = gmf_bytes::shared::SharedBytes::from(vec![0x42u8; BLOCK]);
    let produced = gmf_bus::Payload::from_shared(shared, BLOCK);
    let produced_ptr = produced.as_slice().as_ptr();
    feeder_out.release_write(produced, Duration::from_millis(100)).unwrap();

    a.process().unwrap();
    b.process().unwrap();
    c.process().unwrap();

    let observed = match sink_in.acquire_read(BLOCK, Duration::from_millis(100)).unwrap() {
        gmf_bus::Status::Ok(p) => p,
        other => panic!("expected Ok, got {other:?}"),
    };
    assert_eq!(observed.as_slice().as_ptr(), produced_ptr, "no copy should occur across an all-shareable chain");
}

// 4. Capability mismatch: a shareable producer linked to a non-shareable consumer must
// fall back to an owned intermediate buffer sized max(out_size, in_size).
#[test]
fn capability_mismatch_forces_a_copy_sized_buffer() {
    let out_cap = Capability::block(4096, true);
    let in_cap = Capability::block(8192, false);
    let plan = gmf_bus::intersect(&out_cap, &in_cap).unwrap();
    assert!(!plan.shared, "mismatched shareability/size must not share");
    assert_eq!(plan.size, 8192, "intermediate buffer must be sized max(out_size, in_size)");

    let mut out_port = Port::new("out", Direction::Out, out_cap);
    let mut in_port = Port::new("in", Direction::In, in_cap);
    link(&mut out_port, &mut in_port).unwrap();

    let mut w = match out_port.acquire_write(4096, Duration::from_millis(50)).unwrap() {
        gmf_bus::Status::Ok(p) => p,
        other => panic!("expected Ok, got {other:?}"),
    };
    assert_eq!(w.capacity(), 8192);
    w.as_mut_slice()[..4].copy_from_slice(b"data");
    w.set_valid_size(4);
    out_port.release_write(w, Duration::from_millis(50)).unwrap();

    let r = match in_port.acquire_read(4, Duration::from_millis(50)).unwrap() {
        gmf_bus::Status::Ok(p) => p,
        other => panic!("expected Ok, got {other:?}"),
    };
    assert_eq!(r.as_slice(), b"data");
}

// 5. Method round-trip through a nested-struct descriptor.
#[test]
fn method_round_trip_through_nested_descriptor() {
    let substruct = ArgDescriptor::new()
        .with(ArgEntry::scalar("rate", ArgType::Uint32))
        .with(ArgEntry::scalar("channels", ArgType::Uint8));
    let descriptor = ArgDescriptor::new()
        .with(ArgEntry::structure("mock_args_a", substruct.clone()))
        .with(ArgEntry::structure("mock_args_b", substruct))
        .with(ArgEntry::scalar("volume", ArgType::Float));

    let state = Arc::new(Mutex::new(Vec::<u8>::new()));

    let mut registry = MethodRegistry::new();
    let set_state = state.clone();
    registry.register(
        "set_args",
        descriptor.clone(),
        Arc::new(move |_d, buf| {
            *set_state.lock().unwrap() = buf.to_vec();
            Ok(Vec::new())
        }),
    );
    let get_state = state.clone();
    registry.register("get_args", descriptor.clone(), Arc::new(move |_d, _buf| Ok(get_state.lock().unwrap().clone())));

    let values = vec![
        ArgValue::Struct(vec![
            ("rate".to_string(), ArgValue::Uint32(48_000)),
            ("channels".to_string(), ArgValue::Uint8(2)),
        ]),
        ArgValue::Struct(vec![
            ("rate".to_string(), ArgValue::Uint32(44_100)),
            ("channels".to_string(), ArgValue::Uint8(1)),
        ]),
        ArgValue::Float(0.75),
    ];
    let buf_in = encode(&descriptor, &values).unwrap();

    registry.invoke("set_args", &buf_in).unwrap();
    let buf_out = registry.invoke("get_args", &[]).unwrap();
    assert_eq!(buf_out, buf_in);
}

// 6. URI parsing: a fully-populated URI round-trips every component; a scheme-less
// input is rejected.
#[test]
fn uri_parses_every_component_and_rejects_missing_scheme() {
    let parsed = uri::parse("http://u:p@h:8080/a/b?q=1#f").unwrap();
    assert_eq!(parsed.scheme, "http");
    assert_eq!(parsed.username.as_deref(), Some("u"));
    assert_eq!(parsed.password.as_deref(), Some("p"));
    assert_eq!(parsed.host, "h");
    assert_eq!(parsed.port, Some(8080));
    assert_eq!(parsed.path, "/a/b");
    assert_eq!(parsed.query.as_deref(), Some("q=1"));
    assert_eq!(parsed.fragment.as_deref(), Some("f"));

    let err = uri::parse("bad").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

// A supplementary check that AudioElement's frame-rounding truncation policy (the
// concrete per-element TRUNCATE resolution named in the design notes) composes with a
// real linked chain, not just in isolation.
#[test]
fn audio_element_truncates_to_whole_frames_in_a_linked_chain() {
    let mut feeder_out = Port::new("feeder", Direction::Out, Capability::byte(4096));
    let info = SampleInfo { sample_rate: 44_100, bits: 16, channels: 2 };
    let mut audio = AudioElement::new("pcm", Vec::new(), info);
    audio.add_in_port(Port::new("in", Direction::In, Capability::byte(4096)));
    audio.add_out_port(Port::new("out", Direction::Out, Capability::byte(4096)));
    let mut sink_in = Port::new("sink", Direction::In, Capability::byte(4096));

    link(&mut feeder_out, &mut audio.in_ports_mut()[0]).unwrap();
    link(&mut audio.out_ports_mut()[0], &mut sink_in).unwrap();
    audio.open().unwrap();

    let mut w = match feeder_out.acquire_write(11, Duration::from_millis(50)).unwrap() {
        gmf_bus::Status::Ok(p) => p,
        other => panic!("expected Ok, got {other:?}"),
    };
    w.as_mut_slice()[..11].copy_from_slice(&[1u8; 11]);
    w.set_valid_size(11);
    feeder_out.release_write(w, Duration::from_millis(50)).unwrap();

    let status = audio.process().unwrap();
    assert!(matches!(status, gmf::JobStatus::Truncate));

    let r = match sink_in.acquire_read(8, Duration::from_millis(50)).unwrap() {
        gmf_bus::Status::Ok(p) => p,
        other => panic!("expected Ok, got {other:?}"),
    };
    assert_eq!(r.valid_size() % 4, 0, "a 2-channel, 16-bit frame is 4 bytes wide");
}
