//! The A4 output stream.
//!
//! An `OutputStream` writes one segment: `START_MAGIC`, a `StreamHeader`,
//! body records, a `StreamFooter`, the footer's byte size and `END_MAGIC`.
//! Compression, metadata direction and the default content/metadata
//! classes are configured before the first write; the header is emitted
//! lazily on the first write (or on `close()` for an empty stream).
//!
//! Class ids are assigned lazily. Classes with fixed ids use them; any
//! other class gets the next free id from the content or metadata base
//! and a `ProtoClass` record describing it, emitted before its first
//! record. Metadata and `ProtoClass` records are always written outside
//! compressed sections, so every offset in the footer points at a plain
//! record.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;
use tracing::{debug, error, warn};

use a4stream_core::records::{
    FIRST_CONTENT_CLASS_ID, FIRST_METADATA_CLASS_ID,
};
use a4stream_core::{
    AnyMessage, ClassCount, Codec, EndCompressedSection, Error, FixedClass, ProtoClass, Result,
    StartCompressedSection, StreamFooter, StreamHeader, A4_VERSION,
};

use crate::compress::OutputLayer;
use crate::frame;

struct ClassDecl {
    full_name: &'static str,
    fixed_id: u32,
}

/// Writer state machine for a single A4 segment.
pub struct OutputStream<W: Write> {
    out: OutputLayer<W>,
    name: String,
    description: Option<String>,

    compression: Option<(Codec, u32)>,
    metadata_refers_forward: bool,

    opened: bool,
    closed: bool,
    poisoned: bool,
    in_section: bool,

    declared_content: Option<ClassDecl>,
    declared_metadata: Option<ClassDecl>,
    content_class_id: Option<u32>,
    metadata_class_id: Option<u32>,

    class_ids: HashMap<String, u32>,
    described: HashSet<u32>,
    next_content_id: u32,
    next_metadata_id: u32,

    interior_start: u64,
    metadata_offsets: Vec<u64>,
    protoclass_offsets: Vec<u64>,
    counts: BTreeMap<u32, (u64, String)>,
}

impl OutputStream<BufWriter<File>> {
    /// Create a stream writing to a new file at `path`.
    pub fn create(path: impl AsRef<Path>, description: &str) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), name, description))
    }
}

impl<W: Write> OutputStream<W> {
    pub fn new(sink: W, name: impl Into<String>, description: &str) -> Self {
        OutputStream {
            out: OutputLayer::new(sink),
            name: name.into(),
            description: (!description.is_empty()).then(|| description.to_string()),
            compression: None,
            metadata_refers_forward: false,
            opened: false,
            closed: false,
            poisoned: false,
            in_section: false,
            declared_content: None,
            declared_metadata: None,
            content_class_id: None,
            metadata_class_id: None,
            class_ids: HashMap::new(),
            described: HashSet::new(),
            next_content_id: FIRST_CONTENT_CLASS_ID,
            next_metadata_id: FIRST_METADATA_CLASS_ID,
            interior_start: 0,
            metadata_offsets: Vec::new(),
            protoclass_offsets: Vec::new(),
            counts: BTreeMap::new(),
        }
    }

    /// Metadata will label the records following it instead of the
    /// records before it. Must be called before the stream is opened.
    pub fn set_forward_metadata(&mut self) -> &mut Self {
        assert!(!self.opened, "set_forward_metadata after open");
        self.metadata_refers_forward = true;
        self
    }

    /// Select the body compression codec. `Uncompressed` disables
    /// sections entirely. Must be called before the stream is opened.
    /// The level applies to the deflate codecs and is ignored otherwise.
    pub fn set_compression(&mut self, codec: Codec, level: u32) -> &mut Self {
        assert!(!self.opened, "set_compression after open");
        self.compression = (codec != Codec::Uncompressed).then_some((codec, level));
        self
    }

    /// Declare the default content class. Its records omit the class id
    /// on the wire; the id is announced in the header instead.
    pub fn declare_content_class<T: FixedClass>(&mut self) -> &mut Self {
        assert!(!self.opened, "declare_content_class after open");
        self.declared_content = Some(ClassDecl {
            full_name: T::FULL_NAME,
            fixed_id: T::CLASS_ID,
        });
        self
    }

    /// Declare the metadata class announced in the header.
    pub fn declare_metadata_class<T: FixedClass>(&mut self) -> &mut Self {
        assert!(!self.opened, "declare_metadata_class after open");
        self.declared_metadata = Some(ClassDecl {
            full_name: T::FULL_NAME,
            fixed_id: T::CLASS_ID,
        });
        self
    }

    pub fn opened(&self) -> bool {
        self.opened
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit magic, header and (if configured) the opening compressed
    /// section. Called implicitly by the first write.
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        self.opened = true;
        let result = self.open_inner();
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn open_inner(&mut self) -> Result<()> {
        if let Some(decl) = self.declared_content.take() {
            let id = if decl.fixed_id != 0 {
                decl.fixed_id
            } else {
                let id = self.next_content_id;
                self.next_content_id += 1;
                id
            };
            self.class_ids.insert(decl.full_name.to_string(), id);
            self.content_class_id = Some(id);
        }
        if let Some(decl) = self.declared_metadata.take() {
            let id = if decl.fixed_id != 0 {
                decl.fixed_id
            } else {
                let id = self.next_metadata_id;
                self.next_metadata_id += 1;
                id
            };
            self.class_ids.insert(decl.full_name.to_string(), id);
            self.metadata_class_id = Some(id);
        }

        let header = StreamHeader {
            a4_version: A4_VERSION,
            metadata_refers_forward: self.metadata_refers_forward,
            description: self.description.clone(),
            content_class_id: self.content_class_id,
            metadata_class_id: self.metadata_class_id,
        };
        let w = self.out.plain()?;
        frame::write_magic(w, frame::START_MAGIC)?;
        self.interior_start = w.written();
        frame::write_record(w, Some(StreamHeader::CLASS_ID), &header.encode_to_vec())?;
        self.begin_section()
    }

    /// Write a content record.
    pub fn write<M: AnyMessage + ?Sized>(&mut self, msg: &M) -> Result<()> {
        self.emit(msg, false)
    }

    /// Write a metadata record. The record is placed outside any
    /// compressed section and its offset is recorded for the footer.
    pub fn metadata<M: AnyMessage + ?Sized>(&mut self, msg: &M) -> Result<()> {
        self.emit(msg, true)
    }

    fn emit<M: AnyMessage + ?Sized>(&mut self, msg: &M, is_metadata: bool) -> Result<()> {
        if self.closed || self.poisoned {
            return Err(Error::Closed);
        }
        if !self.opened {
            self.open()?;
        }
        let result = self.emit_inner(msg, is_metadata);
        if result.is_err() {
            self.poisoned = true;
            error!(stream = %self.name, "write failed, stream poisoned");
        }
        result
    }

    fn emit_inner<M: AnyMessage + ?Sized>(&mut self, msg: &M, is_metadata: bool) -> Result<()> {
        let full_name = msg.full_name();
        let (class_id, needs_proto) = match msg.fixed_class_id() {
            Some(id) => {
                self.class_ids.entry(full_name.to_string()).or_insert(id);
                (id, false)
            }
            None => match self.class_ids.get(full_name) {
                Some(&id) => (id, !self.described.contains(&id)),
                None => {
                    // assigned content ids must stay below the metadata
                    // base, or readers would reclassify them as metadata;
                    // metadata ids must stay below the size-word flag bit
                    let id = if is_metadata {
                        if self.next_metadata_id >= frame::CLASS_ID_FLAG {
                            return Err(Error::ClassIdSpaceExhausted);
                        }
                        let id = self.next_metadata_id;
                        self.next_metadata_id += 1;
                        id
                    } else {
                        if self.next_content_id >= FIRST_METADATA_CLASS_ID {
                            return Err(Error::ClassIdSpaceExhausted);
                        }
                        let id = self.next_content_id;
                        self.next_content_id += 1;
                        id
                    };
                    self.class_ids.insert(full_name.to_string(), id);
                    (id, true)
                }
            },
        };

        let payload = msg.encode_payload();

        // ProtoClass and metadata records live between sections, so their
        // footer offsets always point at plain records.
        if needs_proto || is_metadata {
            self.end_section()?;
        }
        if needs_proto {
            let offset = self.out.plain()?.written() - self.interior_start;
            self.protoclass_offsets.push(offset);
            let proto = ProtoClass {
                class_id,
                schema: Some(msg.class_schema()),
            };
            frame::write_record(
                self.out.plain()?,
                Some(ProtoClass::CLASS_ID),
                &proto.encode_to_vec(),
            )?;
            self.described.insert(class_id);
            debug!(stream = %self.name, class = full_name, class_id, "described class in-stream");
        }
        if is_metadata {
            let offset = self.out.plain()?.written() - self.interior_start;
            self.metadata_offsets.push(offset);
        }

        let wire_id = if !is_metadata && Some(class_id) == self.content_class_id {
            None
        } else {
            Some(class_id)
        };
        frame::write_record(&mut self.out, wire_id, &payload)?;

        if needs_proto || is_metadata {
            self.begin_section()?;
        }

        let entry = self
            .counts
            .entry(class_id)
            .or_insert_with(|| (0, full_name.to_string()));
        entry.0 += 1;
        Ok(())
    }

    fn begin_section(&mut self) -> Result<()> {
        if let Some((codec, level)) = self.compression {
            let start = StartCompressedSection::new(codec);
            frame::write_record(
                self.out.plain()?,
                Some(StartCompressedSection::CLASS_ID),
                &start.encode_to_vec(),
            )?;
            self.out.start_section(codec, level)?;
            self.in_section = true;
        }
        Ok(())
    }

    fn end_section(&mut self) -> Result<()> {
        if self.in_section {
            frame::write_record(
                &mut self.out,
                Some(EndCompressedSection::CLASS_ID),
                &EndCompressedSection::default().encode_to_vec(),
            )?;
            self.out.end_section()?;
            self.in_section = false;
        }
        Ok(())
    }

    /// Flush any open section, write the footer and the end magic.
    /// Idempotent; a stream that was never written to still gets a valid
    /// header/footer pair.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.poisoned {
            return Err(Error::Closed);
        }
        if !self.opened {
            self.open()?;
        }
        let result = self.close_inner();
        if result.is_ok() {
            self.closed = true;
        } else {
            self.poisoned = true;
        }
        result
    }

    fn close_inner(&mut self) -> Result<()> {
        self.end_section()?;

        let size = self.out.plain()?.written() - self.interior_start;
        let footer = StreamFooter {
            size,
            metadata_offsets: self.metadata_offsets.clone(),
            protoclass_offsets: self.protoclass_offsets.clone(),
            class_count: self
                .counts
                .iter()
                .map(|(&class_id, (count, name))| ClassCount {
                    class_id,
                    count: *count,
                    class_name: Some(name.clone()),
                })
                .collect(),
        };
        let payload = footer.encode_to_vec();
        let w = self.out.plain()?;
        frame::write_record(w, Some(StreamFooter::CLASS_ID), &payload)?;
        frame::write_u32le(w, payload.len() as u32)?;
        frame::write_magic(w, frame::END_MAGIC)?;
        w.flush()?;
        debug!(stream = %self.name, bytes = w.written(), "stream closed");
        Ok(())
    }
}

impl<W: Write> Drop for OutputStream<W> {
    fn drop(&mut self) {
        if self.opened && !self.closed && !self.poisoned {
            if let Err(e) = self.close() {
                warn!(stream = %self.name, error = %e, "failed to close stream on drop");
            }
        }
    }
}
