//! The multi-stream supervisor: workers pull streams, drain them, and
//! report back; unfinished streams are rescheduled once.

use std::path::Path;
use std::sync::Arc;

use a4stream_core::testing::{register, TestEvent, TestMetaData};
use a4stream_io::{Envelope, InputSet, OutputStream};

fn write_events(path: &Path, base: u32, n: u32) {
    let mut w = OutputStream::create(path, "worker input").unwrap();
    w.set_forward_metadata();
    w.declare_content_class::<TestEvent>();
    w.declare_metadata_class::<TestMetaData>();
    for i in 0..n {
        w.write(&TestEvent {
            event_number: base + i,
        })
        .unwrap();
    }
    w.close().unwrap();
}

#[test]
fn workers_drain_all_streams() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let set = Arc::new(InputSet::new());
    for i in 0..4u32 {
        let path = dir.path().join(format!("in{i}.a4"));
        write_events(&path, i * 10_000, 200);
        set.add_file(&path).unwrap();
    }

    let mut workers = Vec::new();
    for _ in 0..2 {
        let set = Arc::clone(&set);
        workers.push(std::thread::spawn(move || {
            let mut drained = 0u64;
            while let Some(mut stream) = set.next_stream() {
                while let Envelope::Message(_) = stream.next() {
                    drained += 1;
                }
                set.report_finished(stream);
            }
            drained
        }));
    }
    let drained: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(drained, 4 * 200);
    assert_eq!(set.finished_count(), 4);
    assert_eq!(set.error_count(), 0);
    assert!(set.idle());
}

#[test]
fn corrupt_streams_are_reported_as_errors() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.a4");
    let bad = dir.path().join("bad.a4");
    write_events(&good, 0, 50);
    write_events(&bad, 0, 50);
    let mut bytes = std::fs::read(&bad).unwrap();
    let len = bytes.len();
    bytes.truncate(len - 10);
    std::fs::write(&bad, bytes).unwrap();

    let set = InputSet::new();
    set.add_file(&good).unwrap();
    set.add_file(&bad).unwrap();
    while let Some(mut stream) = set.next_stream() {
        while let Envelope::Message(_) = stream.next() {}
        set.report_finished(stream);
    }

    assert_eq!(set.finished_count(), 1);
    assert_eq!(set.error_count(), 1);
    assert!(set.idle());
}

#[test]
fn abandoned_streams_are_rescheduled_once() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slow.a4");
    write_events(&path, 0, 100);

    let set = InputSet::new();
    set.add_file(&path).unwrap();

    // first worker gives up mid-stream
    let mut stream = set.next_stream().unwrap();
    let _ = stream.next();
    set.report_finished(stream);
    assert_eq!(set.finished_count(), 0);
    assert_eq!(set.error_count(), 0);

    // the rescheduled stream is handed out again and finishes
    let mut stream = set.next_stream().unwrap();
    while let Envelope::Message(_) = stream.next() {}
    set.report_finished(stream);
    assert_eq!(set.finished_count(), 1);
    assert!(set.idle());
}

#[test]
fn twice_abandoned_streams_become_errors() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stuck.a4");
    write_events(&path, 0, 100);

    let set = InputSet::new();
    set.add_file(&path).unwrap();

    for _ in 0..2 {
        let mut stream = set.next_stream().unwrap();
        let _ = stream.next();
        set.report_finished(stream);
    }
    assert_eq!(set.finished_count(), 0);
    assert_eq!(set.error_count(), 1);
    assert!(set.idle());
}
