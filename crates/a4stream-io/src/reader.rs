//! The A4 input stream.
//!
//! `InputStream` drives a state machine over the framed byte stream:
//! *header → body (plain ⇄ compressed) → footer → next segment | end*.
//! Control records (compression transitions, `ProtoClass` descriptors,
//! metadata) are consumed internally; `next()` only surfaces content
//! messages, the end of the stream, or an error.
//!
//! ## Metadata direction
//!
//! Forward metadata replaces the current metadata as it is read.
//! Backward metadata labels the records *before* it, so the reader must
//! know all metadata records up front: the header of a backward segment
//! triggers a reverse discovery pass, and sequential reading then walks
//! an index into the discovered list.
//!
//! ## Discovery
//!
//! The on-disk layout puts the footer's byte size directly before
//! `END_MAGIC`, so a seekable stream can be walked backward without an
//! external index: read the footer, jump to the segment start it
//! describes, repeat until offset zero. Each pass records header
//! positions, metadata records and in-stream descriptors for every
//! segment, which is also what `seek_to` navigates.
//!
//! Errors are terminal: the stream stores the error, `error()` turns
//! true, and `next()` keeps returning the error envelope without I/O.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use prost::Message;
use tracing::{debug, error, warn};

use a4stream_core::records::FIRST_METADATA_CLASS_ID;
use a4stream_core::{
    A4Message, ClassPool, Codec, EndCompressedSection, Envelope, Error, FixedClass, ProtoClass,
    Result, StartCompressedSection, StreamFooter, StreamHeader, A4_VERSION,
};

use crate::compress::InputLayer;
use crate::frame::{self, MagicCheck};
use crate::resource::{InputResource, TrackedReader};

/// Everything discovery learns about one segment, in file order.
struct Segment {
    header_pos: u64,
    forward: bool,
    metadata_positions: Vec<u64>,
    metadata: Vec<A4Message>,
    pool: Arc<ClassPool>,
    footer: StreamFooter,
    header: StreamHeader,
}

/// Reader state machine for a (possibly concatenated) A4 stream.
pub struct InputStream<R: InputResource> {
    input: InputLayer<R>,
    name: String,

    started: bool,
    good: bool,
    error: Option<Error>,
    expect_header: bool,
    plain_section: bool,

    discovery_complete: bool,
    segments: Vec<Segment>,

    current_header: Option<StreamHeader>,
    current_metadata: Option<A4Message>,
    new_metadata: bool,
    metadata_refers_forward: bool,
    content_class_id: Option<u32>,
    metadata_class_id: Option<u32>,
    pool: Arc<ClassPool>,

    segment_index: usize,
    metadata_index: i64,
    items_read: u64,
}

impl InputStream<File> {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path)?;
        Ok(Self::new(file, name))
    }
}

impl<R: InputResource> InputStream<R> {
    pub fn new(resource: R, name: impl Into<String>) -> Self {
        InputStream {
            input: InputLayer::new(TrackedReader::new(resource)),
            name: name.into(),
            started: false,
            good: true,
            error: None,
            expect_header: false,
            plain_section: false,
            discovery_complete: false,
            segments: Vec::new(),
            current_header: None,
            current_metadata: None,
            new_metadata: false,
            metadata_refers_forward: false,
            content_class_id: None,
            metadata_class_id: None,
            pool: ClassPool::new(),
            segment_index: 0,
            metadata_index: -1,
            items_read: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the stream can produce more messages.
    pub fn is_good(&self) -> bool {
        self.good && self.error.is_none()
    }

    /// True once the stream has terminated cleanly.
    pub fn end(&self) -> bool {
        !self.good && self.error.is_none()
    }

    /// True once the stream has failed. Sticky.
    pub fn error(&self) -> bool {
        self.error.is_some()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn items_read(&self) -> u64 {
        self.items_read
    }

    /// The header of the segment currently being read.
    pub fn header(&self) -> Option<&StreamHeader> {
        self.current_header.as_ref()
    }

    /// The metadata in force for the message most recently returned.
    pub fn current_metadata(&self) -> Option<&A4Message> {
        self.current_metadata.as_ref()
    }

    /// True if the current metadata changed since the last call.
    pub fn take_new_metadata(&mut self) -> bool {
        std::mem::take(&mut self.new_metadata)
    }

    /// Number of segments, known after discovery.
    pub fn segment_count(&self) -> Option<usize> {
        self.discovery_complete.then(|| self.segments.len())
    }

    /// Number of metadata records in a segment, known after discovery.
    pub fn metadata_count(&self, segment: usize) -> Option<usize> {
        if !self.discovery_complete {
            return None;
        }
        self.segments.get(segment).map(|s| s.metadata.len())
    }

    /// A segment's footer (with class names resolved), known after
    /// discovery.
    pub fn segment_footer(&self, segment: usize) -> Option<&StreamFooter> {
        if !self.discovery_complete {
            return None;
        }
        self.segments.get(segment).map(|s| &s.footer)
    }

    /// Read until the next content message.
    pub fn next(&mut self) -> Envelope {
        self.advance(false)
    }

    /// Like [`next`](Self::next), but metadata records are returned to
    /// the caller as well instead of being consumed silently.
    pub fn next_with_metadata(&mut self) -> Envelope {
        self.advance(true)
    }

    fn advance(&mut self, stop_after_metadata: bool) -> Envelope {
        if let Some(e) = &self.error {
            return Envelope::Error(e.kind());
        }
        if !self.good {
            return Envelope::End;
        }
        if !self.started {
            self.started = true;
            match self.begin_segment(0) {
                Ok(true) => {}
                Ok(false) => return self.fail(Error::Truncated("empty stream")),
                Err(e) => return self.fail(e),
            }
        }
        if self.expect_header {
            self.expect_header = false;
            match self.begin_segment(self.segment_index) {
                Ok(true) => {}
                Ok(false) => return self.fail(Error::Truncated("missing segment header")),
                Err(e) => return self.fail(e),
            }
        }
        loop {
            let record = match frame::read_record(&mut self.input) {
                Ok(r) => r,
                Err(e) => return self.fail(e),
            };
            let class_id = match record.class_id.or(self.content_class_id) {
                Some(id) => id,
                None => {
                    return self.fail(Error::InvalidStream(
                        "record without class id and no default content class".into(),
                    ))
                }
            };
            match class_id {
                id if id == StartCompressedSection::CLASS_ID => {
                    if let Err(e) = self.enter_section(&record.payload) {
                        return self.fail(e);
                    }
                }
                id if id == EndCompressedSection::CLASS_ID => {
                    if self.plain_section {
                        self.plain_section = false;
                    } else if let Err(e) = self.input.end_section() {
                        return self.fail(e);
                    }
                }
                id if id == ProtoClass::CLASS_ID => {
                    let proto = match ProtoClass::decode(&record.payload[..]) {
                        Ok(p) => p,
                        Err(e) => return self.fail(e.into()),
                    };
                    if let Err(e) = self.pool.add_protoclass(&proto) {
                        return self.fail(e);
                    }
                }
                id if id == StreamHeader::CLASS_ID => {
                    return self.fail(Error::InvalidStream(
                        "stream header in the middle of a segment".into(),
                    ));
                }
                id if id == StreamFooter::CLASS_ID => match self.finish_segment(&record.payload) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.good = false;
                        return Envelope::End;
                    }
                    Err(e) => return self.fail(e),
                },
                id if self.is_metadata_class(id) => {
                    let msg = match self.parse_message(id, &record.payload) {
                        Ok(m) => m,
                        Err(e) => return self.fail(e),
                    };
                    self.metadata_index += 1;
                    if self.metadata_refers_forward {
                        self.current_metadata = Some(msg.clone());
                    } else {
                        // labeled content lies behind us; what follows
                        // belongs to the next discovered metadata record
                        self.current_metadata = self.segments[self.segment_index]
                            .metadata
                            .get(self.metadata_index as usize)
                            .cloned();
                    }
                    self.new_metadata = true;
                    if stop_after_metadata {
                        return Envelope::Message(msg);
                    }
                }
                id => {
                    let msg = match self.parse_message(id, &record.payload) {
                        Ok(m) => m,
                        Err(e) => return self.fail(e),
                    };
                    self.items_read += 1;
                    return Envelope::Message(msg);
                }
            }
        }
    }

    fn enter_section(&mut self, payload: &[u8]) -> Result<()> {
        let start = StartCompressedSection::decode(payload)?;
        let codec = start.codec()?;
        if self.plain_section || !self.input.is_plain() {
            return Err(Error::InvalidStream("nested compressed section".into()));
        }
        if codec == Codec::Uncompressed {
            self.plain_section = true;
            Ok(())
        } else {
            self.input.start_section(codec)
        }
    }

    fn is_metadata_class(&self, class_id: u32) -> bool {
        Some(class_id) == self.metadata_class_id || class_id >= FIRST_METADATA_CLASS_ID
    }

    fn parse_message(&self, class_id: u32, payload: &[u8]) -> Result<A4Message> {
        let entry = self
            .pool
            .entry(class_id)
            .ok_or(Error::UnknownClassId(class_id))?;
        let body = entry.parse(payload)?;
        Ok(A4Message::new(class_id, body, self.pool.clone()))
    }

    /// Read `START_MAGIC` plus the header record of segment `index`.
    /// `Ok(false)` means a clean EOF at the segment boundary.
    fn begin_segment(&mut self, index: usize) -> Result<bool> {
        match frame::read_magic(&mut self.input, frame::START_MAGIC, "start magic")? {
            MagicCheck::Eof => return Ok(false),
            MagicCheck::Found => {}
        }
        self.segment_index = index;
        self.read_header_record()?;
        Ok(true)
    }

    fn read_header_record(&mut self) -> Result<()> {
        let record = frame::read_record(&mut self.input)?;
        if record.class_id != Some(StreamHeader::CLASS_ID) {
            return Err(Error::InvalidStream(
                "first record of segment is not a stream header".into(),
            ));
        }
        let header = StreamHeader::decode(&record.payload[..])?;
        if header.a4_version != A4_VERSION {
            error!(stream = %self.name, version = header.a4_version, "unknown A4 stream version");
            return Err(Error::VersionMismatch(header.a4_version));
        }

        self.metadata_refers_forward = header.metadata_refers_forward;
        self.content_class_id = header.content_class_id;
        self.metadata_class_id = header.metadata_class_id;

        // fresh descriptor scope per segment
        self.pool = if self.discovery_complete {
            match self.segments.get(self.segment_index) {
                Some(seg) => seg.pool.clone(),
                None => ClassPool::new(),
            }
        } else {
            ClassPool::new()
        };

        if !header.metadata_refers_forward {
            if !self.discovery_complete {
                if !self.input.plain()?.seekable() {
                    error!(
                        stream = %self.name,
                        "cannot read backward metadata from an unseekable stream"
                    );
                    return Err(Error::NotSeekable);
                }
                self.discover()?;
                self.pool = self.segments[self.segment_index].pool.clone();
            }
            self.metadata_index = 0;
            self.current_metadata = self.segments[self.segment_index].metadata.first().cloned();
        } else {
            self.metadata_index = -1;
        }
        self.current_header = Some(header);
        self.new_metadata = true;
        Ok(())
    }

    /// Consume the footer trailer and either start the next segment or
    /// report the clean end of the stream (`Ok(false)`).
    fn finish_segment(&mut self, payload: &[u8]) -> Result<bool> {
        let _footer = StreamFooter::decode(payload)?;
        if self.plain_section || !self.input.is_plain() {
            return Err(Error::InvalidStream(
                "stream footer inside a compressed section".into(),
            ));
        }
        let _footer_size = frame::read_u32le(&mut self.input, "footer size")?;
        match frame::read_magic(&mut self.input, frame::END_MAGIC, "end magic")? {
            MagicCheck::Found => {}
            MagicCheck::Eof => return Err(Error::Truncated("missing end magic")),
        }
        self.current_metadata = None;
        self.new_metadata = true;
        self.begin_segment(self.segment_index + 1)
    }

    fn fail(&mut self, e: Error) -> Envelope {
        error!(stream = %self.name, error = %e, "stream error");
        let kind = e.kind();
        self.error = Some(e);
        self.good = false;
        Envelope::Error(kind)
    }

    // -----------------------------------------------------------------
    // Discovery and seeking
    // -----------------------------------------------------------------

    /// Reverse-scan the footer chain and record every segment. Restores
    /// the read position on success.
    fn discover(&mut self) -> Result<()> {
        if self.discovery_complete {
            return Ok(());
        }
        let resume = self.input.plain()?.tell();
        self.discover_inner()?;
        self.input.plain()?.seek_abs(resume)?;
        Ok(())
    }

    fn discover_inner(&mut self) -> Result<()> {
        let tracked = self.input.plain()?;
        let file_len = tracked.seek_from_end(0)?;
        let mut segments_rev: Vec<Segment> = Vec::new();
        let mut tail = file_len;

        loop {
            if tail < 8 + 4 {
                return Err(Error::Truncated("segment tail"));
            }
            tracked.seek_abs(tail - 8)?;
            match frame::read_magic(tracked, frame::END_MAGIC, "end magic")? {
                MagicCheck::Found => {}
                MagicCheck::Eof => return Err(Error::Truncated("missing end magic")),
            }
            tracked.seek_abs(tail - 12)?;
            let footer_size = u64::from(frame::read_u32le(tracked, "footer size")?);

            let footer_record_start = tail
                .checked_sub(12 + footer_size + 8)
                .ok_or(Error::Truncated("footer size exceeds stream"))?;
            tracked.seek_abs(footer_record_start)?;
            let record = frame::read_record(tracked)?;
            if record.class_id != Some(StreamFooter::CLASS_ID) {
                return Err(Error::InvalidStream("expected stream footer".into()));
            }
            let mut footer = StreamFooter::decode(&record.payload[..])?;

            let header_pos = footer_record_start
                .checked_sub(footer.size + 8)
                .ok_or(Error::Truncated("segment size exceeds stream"))?;
            let interior = header_pos + 8;

            tracked.seek_abs(interior)?;
            let hrec = frame::read_record(tracked)?;
            if hrec.class_id != Some(StreamHeader::CLASS_ID) {
                return Err(Error::InvalidStream(
                    "segment does not start with a stream header".into(),
                ));
            }
            let header = StreamHeader::decode(&hrec.payload[..])?;
            if header.a4_version != A4_VERSION {
                return Err(Error::VersionMismatch(header.a4_version));
            }

            // in-stream descriptors first, metadata may need them
            let pool = ClassPool::new();
            for &off in &footer.protoclass_offsets {
                tracked.seek_abs(interior + off)?;
                let prec = frame::read_record(tracked)?;
                if prec.class_id != Some(ProtoClass::CLASS_ID) {
                    return Err(Error::InvalidStream(
                        "protoclass offset does not point at a plain ProtoClass record".into(),
                    ));
                }
                pool.add_protoclass(&ProtoClass::decode(&prec.payload[..])?)?;
            }

            let mut metadata_positions = Vec::with_capacity(footer.metadata_offsets.len());
            let mut metadata = Vec::with_capacity(footer.metadata_offsets.len());
            for &off in &footer.metadata_offsets {
                let pos = interior + off;
                tracked.seek_abs(pos)?;
                let mrec = frame::read_record(tracked)?;
                let id = mrec.class_id.or(header.content_class_id).ok_or_else(|| {
                    Error::InvalidStream("metadata record without class id".into())
                })?;
                let entry = pool.entry(id).ok_or(Error::UnknownClassId(id))?;
                let body = entry.parse(&mrec.payload)?;
                metadata_positions.push(pos);
                metadata.push(A4Message::new(id, body, pool.clone()));
            }

            for cc in footer.class_count.iter_mut() {
                if cc.class_name.is_none() {
                    cc.class_name = pool.full_name(cc.class_id);
                }
            }

            segments_rev.push(Segment {
                header_pos,
                forward: header.metadata_refers_forward,
                metadata_positions,
                metadata,
                pool,
                footer,
                header,
            });

            if header_pos == 0 {
                break;
            }
            tail = header_pos;
        }

        segments_rev.reverse();
        self.segments = segments_rev;
        self.discovery_complete = true;
        debug!(stream = %self.name, segments = self.segments.len(), "discovery complete");
        Ok(())
    }

    /// Reposition the stream at metadata boundary `(segment, metadata)`.
    ///
    /// With `carry`, out-of-range metadata indices borrow from or spill
    /// into neighboring segments: the pair is mapped onto the single
    /// global metadata index and re-split. The index one past the last
    /// metadata record addresses the end of the stream; seeking there
    /// terminates the stream cleanly and returns `false`.
    ///
    /// Returns `true` if the stream was repositioned. Invalid targets
    /// leave the stream where it was (an active compressed section is
    /// discarded regardless, as with any seek).
    pub fn seek_to(&mut self, segment: usize, metadata: i64, carry: bool) -> bool {
        if self.error.is_some() {
            return false;
        }
        // snapshot for the invalid-target case; only possible while plain
        let resume = self
            .input
            .plain()
            .ok()
            .map(|t| (t.tell(), self.started, self.good, self.plain_section));
        if let Err(e) = self.prepare_seek() {
            self.fail(e);
            return false;
        }

        let counts: Vec<i64> = self.segments.iter().map(|s| s.metadata.len() as i64).collect();
        let total: i64 = counts.iter().sum();
        let global = if segment >= counts.len() {
            None
        } else {
            let base: i64 = counts[..segment].iter().sum();
            let global = base + metadata;
            let in_range = if carry {
                (0..=total).contains(&global)
            } else {
                (0..=counts[segment]).contains(&metadata)
            };
            in_range.then_some(global)
        };
        let Some(mut global) = global else {
            let rejected = Error::InvalidSeekTarget { segment, metadata };
            warn!(stream = %self.name, error = %rejected, "seek rejected");
            if let Some((pos, started, good, plain_section)) = resume {
                if let Ok(tracked) = self.input.plain() {
                    let _ = tracked.seek_abs(pos);
                }
                self.started = started;
                self.good = good;
                self.plain_section = plain_section;
            }
            return false;
        };

        if global == total {
            // one past the last metadata record: end of stream
            self.good = false;
            self.current_metadata = None;
            return false;
        }
        let mut seg = 0usize;
        while global >= counts[seg] {
            global -= counts[seg];
            seg += 1;
        }

        if let Err(e) = self.do_seek(seg, global as usize) {
            self.fail(e);
            return false;
        }
        !self.error()
    }

    fn prepare_seek(&mut self) -> Result<()> {
        self.started = true;
        self.plain_section = false;
        self.input.abandon_section()?;
        if !self.discovery_complete {
            if !self.input.plain()?.seekable() {
                error!(stream = %self.name, "cannot seek in an unseekable stream");
                return Err(Error::NotSeekable);
            }
            self.discover_inner()?;
        }
        Ok(())
    }

    fn do_seek(&mut self, seg: usize, m: usize) -> Result<()> {
        let forward = self.segments[seg].forward;
        let header = self.segments[seg].header.clone();
        let pool = self.segments[seg].pool.clone();
        let header_pos = self.segments[seg].header_pos;

        self.segment_index = seg;
        self.pool = pool;
        self.metadata_refers_forward = forward;
        self.content_class_id = header.content_class_id;
        self.metadata_class_id = header.metadata_class_id;
        self.current_header = Some(header);
        self.good = true;
        self.expect_header = false;

        if forward {
            // position on the metadata record itself; reading it makes it
            // current before the first content record it labels
            self.metadata_index = m as i64 - 1;
            self.current_metadata = None;
            let pos = self.segments[seg].metadata_positions[m];
            self.input.plain()?.seek_abs(pos)?;
        } else if m == 0 {
            // re-enter the segment from its header, which installs the
            // first discovered metadata
            self.current_metadata = None;
            self.metadata_index = 0;
            self.input.plain()?.seek_abs(header_pos)?;
            self.expect_header = true;
        } else {
            // land on the previous metadata record and read exactly it:
            // the backward direction rule then makes metadata `m` current
            self.metadata_index = m as i64 - 1;
            let pos = self.segments[seg].metadata_positions[m - 1];
            self.input.plain()?.seek_abs(pos)?;
            self.advance(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Unseekable;
    use crate::writer::OutputStream;
    use a4stream_core::testing::{TestEvent, TestMetaData};
    use a4stream_core::ErrorKind;
    use std::io::Cursor;

    fn forward_bytes(n: u32) -> Vec<u8> {
        a4stream_core::testing::register();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.a4");
        let mut w = OutputStream::create(&path, "forward").unwrap();
        w.set_forward_metadata();
        w.declare_content_class::<TestEvent>();
        w.declare_metadata_class::<TestMetaData>();
        w.metadata(&TestMetaData { meta_data: 1 }).unwrap();
        for i in 0..n {
            w.write(&TestEvent { event_number: 1000 + i }).unwrap();
        }
        w.close().unwrap();
        std::fs::read(&path).unwrap()
    }

    // ---------------------------------------------------------------
    // Streaming from unseekable resources
    // ---------------------------------------------------------------

    #[test]
    fn forward_streams_do_not_need_seeking() {
        let bytes = forward_bytes(10);
        let mut r = InputStream::new(Unseekable::new(Cursor::new(bytes)), "pipe");
        let mut seen = 0;
        while let Envelope::Message(m) = r.next() {
            assert_eq!(m.get::<TestEvent>().unwrap().event_number, 1000 + seen);
            seen += 1;
        }
        assert_eq!(seen, 10);
        assert!(r.end());
        assert!(!r.error());
    }

    #[test]
    fn seeking_an_unseekable_stream_fails() {
        let bytes = forward_bytes(3);
        let mut r = InputStream::new(Unseekable::new(Cursor::new(bytes)), "pipe");
        assert!(!r.seek_to(0, 0, true));
        assert!(r.error());
        assert_eq!(
            r.next().class_id(),
            1,
            "errored stream keeps returning the error envelope"
        );
    }

    // ---------------------------------------------------------------
    // Error classification
    // ---------------------------------------------------------------

    #[test]
    fn empty_input_is_an_error_not_an_end() {
        let mut r = InputStream::new(Cursor::new(Vec::<u8>::new()), "empty");
        let env = r.next();
        assert!(env.is_error());
        assert!(r.error());
        assert!(!r.end());
    }

    #[test]
    fn garbage_magic_is_a_magic_mismatch() {
        let mut r = InputStream::new(Cursor::new(b"DEADBEEFDEADBEEF".to_vec()), "junk");
        match r.next() {
            Envelope::Error(kind) => assert_eq!(kind, ErrorKind::MagicMismatch),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn version_one_header_is_rejected() {
        let header = StreamHeader {
            a4_version: 1,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        frame::write_magic(&mut bytes, frame::START_MAGIC).unwrap();
        frame::write_record(&mut bytes, Some(StreamHeader::CLASS_ID), &header.encode_to_vec())
            .unwrap();
        let mut r = InputStream::new(Cursor::new(bytes), "v1");
        match r.next() {
            Envelope::Error(kind) => assert_eq!(kind, ErrorKind::VersionMismatch),
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_stream_reports_truncation() {
        let mut bytes = forward_bytes(100);
        bytes.truncate(bytes.len() - 21);
        let mut r = InputStream::new(Cursor::new(bytes), "cut");
        loop {
            match r.next() {
                Envelope::Message(_) => continue,
                Envelope::Error(kind) => {
                    assert_eq!(kind, ErrorKind::Truncation);
                    break;
                }
                Envelope::End => panic!("truncated stream must not end cleanly"),
            }
        }
        assert!(r.error());
        assert!(!r.end());
    }

    #[test]
    fn unknown_class_id_is_reported() {
        let mut bytes = Vec::new();
        frame::write_magic(&mut bytes, frame::START_MAGIC).unwrap();
        let header = StreamHeader {
            a4_version: A4_VERSION,
            metadata_refers_forward: true,
            ..Default::default()
        };
        frame::write_record(&mut bytes, Some(StreamHeader::CLASS_ID), &header.encode_to_vec())
            .unwrap();
        frame::write_record(&mut bytes, Some(180), b"??").unwrap();
        let mut r = InputStream::new(Cursor::new(bytes), "unknown");
        match r.next() {
            Envelope::Error(kind) => assert_eq!(kind, ErrorKind::UnknownClassId),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
