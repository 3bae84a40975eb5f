//! Concatenation closure and metadata-boundary seeking.
//!
//! Appending two valid streams byte-wise yields a valid stream; segment
//! indices follow file order. `seek_to(segment, metadata)` must reproduce
//! exactly the suffix forward iteration would have produced.

use std::path::Path;

use a4stream_core::testing::{register, TestEvent, TestMetaData};
use a4stream_core::FixedClass;
use a4stream_io::{Envelope, InputStream, OutputStream};

const N: u32 = 500;

fn write_forward(path: &Path) {
    let mut w = OutputStream::create(path, "fw").unwrap();
    w.set_forward_metadata();
    w.declare_content_class::<TestEvent>();
    w.declare_metadata_class::<TestMetaData>();
    w.metadata(&TestMetaData { meta_data: 1 }).unwrap();
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 1000 + i,
        })
        .unwrap();
    }
    w.metadata(&TestMetaData { meta_data: 2 }).unwrap();
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 2000 + i,
        })
        .unwrap();
    }
    w.close().unwrap();
}

fn write_backward(path: &Path) {
    let mut w = OutputStream::create(path, "bw").unwrap();
    w.declare_content_class::<TestEvent>();
    w.declare_metadata_class::<TestMetaData>();
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 1000 + i,
        })
        .unwrap();
    }
    w.metadata(&TestMetaData { meta_data: 1 }).unwrap();
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 2000 + i,
        })
        .unwrap();
    }
    w.metadata(&TestMetaData { meta_data: 2 }).unwrap();
    w.close().unwrap();
}

/// Forward segment carrying events but no metadata at all.
fn write_plain_events(path: &Path) {
    let mut w = OutputStream::create(path, "plain").unwrap();
    w.set_forward_metadata();
    w.declare_content_class::<TestEvent>();
    w.declare_metadata_class::<TestMetaData>();
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 1000 + i,
        })
        .unwrap();
    }
    for i in 0..N {
        w.write(&TestEvent {
            event_number: 2000 + i,
        })
        .unwrap();
    }
    w.close().unwrap();
}

fn concat(paths: &[&Path], out: &Path) {
    let mut bytes = Vec::new();
    for p in paths {
        bytes.extend_from_slice(&std::fs::read(p).unwrap());
    }
    std::fs::write(out, bytes).unwrap();
}

/// Drain the reader, collecting `(event_number, current metadata)` pairs.
fn drain(r: &mut InputStream<std::fs::File>) -> Vec<(u32, Option<u32>)> {
    let mut out = Vec::new();
    while let Envelope::Message(msg) = r.next() {
        let event = msg.get::<TestEvent>().unwrap().event_number;
        let md = r
            .current_metadata()
            .and_then(|m| m.get::<TestMetaData>())
            .map(|m| m.meta_data);
        out.push((event, md));
    }
    assert!(!r.error(), "unexpected error: {:?}", r.last_error());
    out
}

#[test]
fn concatenated_forward_streams_read_as_one() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.a4");
    let cat = dir.path().join("cat.a4");
    write_forward(&a);
    concat(&[&a, &a], &cat);

    let mut r = InputStream::open(&cat).unwrap();
    let events = drain(&mut r);
    assert!(r.end());
    assert_eq!(events.len(), 4 * N as usize);
    for (event, md) in &events {
        assert_eq!(md.unwrap(), event / 1000);
    }
}

#[test]
fn mixed_direction_concatenation_reads_as_one() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let fw = dir.path().join("fw.a4");
    let bw = dir.path().join("bw.a4");
    for (order, name) in [([&fw, &bw], "fwbw.a4"), ([&bw, &fw], "bwfw.a4")] {
        write_forward(&fw);
        write_backward(&bw);
        let cat = dir.path().join(name);
        concat(&order.map(|p| p.as_path()), &cat);

        let mut r = InputStream::open(&cat).unwrap();
        let events = drain(&mut r);
        assert!(r.end(), "{name} should end cleanly");
        assert_eq!(events.len(), 4 * N as usize, "{name}");
        for (event, md) in &events {
            assert_eq!(md.unwrap(), event / 1000, "{name}");
        }
    }
}

#[test]
fn seek_into_second_segment() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.a4");
    let bw = dir.path().join("bw.a4");
    let cat = dir.path().join("cat.a4");
    write_plain_events(&plain);
    write_backward(&bw);
    concat(&[&plain, &bw], &cat);

    let mut r = InputStream::open(&cat).unwrap();
    assert!(r.seek_to(1, 0, true));
    assert_eq!(r.segment_count(), Some(2));
    assert_eq!(r.metadata_count(0), Some(0));
    assert_eq!(r.metadata_count(1), Some(2));

    let footer = r.segment_footer(1).unwrap();
    let events = footer
        .class_count
        .iter()
        .find(|c| c.class_id == TestEvent::CLASS_ID)
        .unwrap();
    assert_eq!(events.count, u64::from(2 * N));
    assert_eq!(events.class_name.as_deref(), Some("a4stream.TestEvent"));

    let events = drain(&mut r);
    assert!(r.end());
    assert_eq!(events.len(), 2 * N as usize);
    assert_eq!(events[0], (1000, Some(1)));
    assert_eq!(events[N as usize], (2000, Some(2)));
}

#[test]
fn seek_matches_forward_iteration_suffix() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        ("fw.a4", write_forward as fn(&Path)),
        ("bw.a4", write_backward as fn(&Path)),
    ];
    for (name, write) in cases {
        let path = dir.path().join(name);
        write(&path);

        let mut r = InputStream::open(&path).unwrap();
        let full = drain(&mut r);

        for k in 0..2i64 {
            let mut r = InputStream::open(&path).unwrap();
            assert!(r.seek_to(0, k, true), "{name} seek to {k}");
            let suffix = drain(&mut r);
            assert_eq!(
                suffix,
                full[(k as usize) * N as usize..].to_vec(),
                "{name} seek to metadata {k}"
            );
        }
    }
}

#[test]
fn carry_normalizes_across_segments() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let fw = dir.path().join("fw.a4");
    let bw = dir.path().join("bw.a4");
    let cat = dir.path().join("cat.a4");
    write_forward(&fw);
    write_backward(&bw);
    concat(&[&fw, &bw], &cat);

    // (0, 3) spills into segment 1, metadata 1
    let mut r = InputStream::open(&cat).unwrap();
    assert!(r.seek_to(0, 3, true));
    let spilled = drain(&mut r);

    let mut r = InputStream::open(&cat).unwrap();
    assert!(r.seek_to(1, 1, true));
    let direct = drain(&mut r);
    assert_eq!(spilled, direct);
    assert_eq!(spilled.first(), Some(&(2000, Some(2))));

    // (1, -1) borrows from segment 0, metadata 1
    let mut r = InputStream::open(&cat).unwrap();
    assert!(r.seek_to(1, -1, true));
    let borrowed = drain(&mut r);
    assert_eq!(borrowed.len(), 3 * N as usize);
    assert_eq!(borrowed.first(), Some(&(2000, Some(2))));
}

#[test]
fn invalid_seek_targets_leave_the_stream_intact() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fw.a4");
    write_forward(&path);

    let mut r = InputStream::open(&path).unwrap();
    assert!(!r.seek_to(5, 0, true));
    assert!(!r.seek_to(0, 99, true));
    assert!(!r.seek_to(0, -1, true));
    assert!(!r.error(), "invalid targets are not fatal");

    // still fully readable afterwards
    let events = drain(&mut r);
    assert_eq!(events.len(), 2 * N as usize);
}

#[test]
fn seek_past_the_last_metadata_is_end_of_stream() {
    register();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fw.a4");
    write_forward(&path);

    let mut r = InputStream::open(&path).unwrap();
    assert!(!r.seek_to(0, 2, true));
    assert!(r.end());
    assert!(!r.error());
    assert!(r.next().is_end());

    // seeking backward re-arms the ended stream
    assert!(r.seek_to(0, 1, true));
    let events = drain(&mut r);
    assert_eq!(events.len(), N as usize);
}
