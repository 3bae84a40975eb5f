//! Built-in control records of the A4 stream format.
//!
//! Every segment is framed by a `StreamHeader` and a `StreamFooter`;
//! compressed regions are bracketed by `StartCompressedSection` /
//! `EndCompressedSection`; dynamically described classes are introduced by
//! `ProtoClass` records. All five carry fixed class ids so any reader can
//! parse them without prior negotiation.

use crate::message::FixedClass;
use crate::schema::{ClassSchema, FieldKind};
use crate::error::{Error, Result};

/// Fixed class ids of the built-in record types. Ids below
/// [`FIRST_CONTENT_CLASS_ID`] are reserved for the format itself and for
/// compiled-in classes.
pub const STREAM_HEADER_CLASS_ID: u32 = 100;
pub const STREAM_FOOTER_CLASS_ID: u32 = 101;
pub const PROTO_CLASS_CLASS_ID: u32 = 102;
pub const START_COMPRESSED_SECTION_CLASS_ID: u32 = 103;
pub const END_COMPRESSED_SECTION_CLASS_ID: u32 = 104;

/// First id handed out by a writer to content classes without a fixed id.
pub const FIRST_CONTENT_CLASS_ID: u32 = 200;
/// First id handed out by a writer to metadata classes without a fixed id.
/// Ids at or above this base are always treated as metadata by readers.
pub const FIRST_METADATA_CLASS_ID: u32 = 500;

/// The stream format version this crate reads and writes.
pub const A4_VERSION: u32 = 2;

/// First record of every segment.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamHeader {
    #[prost(uint32, tag = "1")]
    pub a4_version: u32,
    #[prost(bool, tag = "2")]
    pub metadata_refers_forward: bool,
    #[prost(string, optional, tag = "3")]
    pub description: Option<String>,
    #[prost(uint32, optional, tag = "4")]
    pub content_class_id: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub metadata_class_id: Option<u32>,
}

/// Last record of every segment, written just before the trailing
/// `footer_size` word and `END_MAGIC`. Offsets are relative to the segment
/// interior (the first byte after `START_MAGIC`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamFooter {
    #[prost(uint64, tag = "1")]
    pub size: u64,
    #[prost(uint64, repeated, tag = "2")]
    pub metadata_offsets: Vec<u64>,
    #[prost(uint64, repeated, tag = "3")]
    pub protoclass_offsets: Vec<u64>,
    #[prost(message, repeated, tag = "4")]
    pub class_count: Vec<ClassCount>,
}

/// Per-class record count reported by the footer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClassCount {
    #[prost(uint32, tag = "1")]
    pub class_id: u32,
    #[prost(uint64, tag = "2")]
    pub count: u64,
    #[prost(string, optional, tag = "3")]
    pub class_name: Option<String>,
}

/// Compression codecs a section can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Codec {
    Uncompressed = 0,
    Zlib = 1,
    Gzip = 2,
    Snappy = 3,
    Lz4 = 4,
}

/// Opens a compressed section; all following records up to the matching
/// `EndCompressedSection` are coded with the selected codec.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartCompressedSection {
    #[prost(enumeration = "Codec", tag = "1")]
    pub compression: i32,
}

impl StartCompressedSection {
    pub fn new(codec: Codec) -> Self {
        StartCompressedSection {
            compression: codec as i32,
        }
    }

    pub fn codec(&self) -> Result<Codec> {
        Codec::try_from(self.compression).map_err(|_| Error::UnknownCodec(self.compression))
    }
}

/// Closes the current compressed section. Written as the final record
/// inside the coded byte stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EndCompressedSection {}

/// Carries the schema of a dynamically described class. Emitted by the
/// writer before the first record of any class without a fixed id.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoClass {
    #[prost(uint32, tag = "1")]
    pub class_id: u32,
    #[prost(message, optional, tag = "2")]
    pub schema: Option<ClassSchema>,
}

crate::stream_class!(StreamHeader);
crate::stream_class!(StreamFooter);
crate::stream_class!(StartCompressedSection);
crate::stream_class!(EndCompressedSection);
crate::stream_class!(ProtoClass);

impl FixedClass for StreamHeader {
    const CLASS_ID: u32 = STREAM_HEADER_CLASS_ID;
    const FULL_NAME: &'static str = "a4stream.StreamHeader";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME)
            .with_field(1, "a4_version", FieldKind::Uint32, false)
            .with_field(2, "metadata_refers_forward", FieldKind::Bool, false)
            .with_field(3, "description", FieldKind::String, false)
            .with_field(4, "content_class_id", FieldKind::Uint32, false)
            .with_field(5, "metadata_class_id", FieldKind::Uint32, false)
    }
}

impl FixedClass for StreamFooter {
    const CLASS_ID: u32 = STREAM_FOOTER_CLASS_ID;
    const FULL_NAME: &'static str = "a4stream.StreamFooter";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME)
            .with_field(1, "size", FieldKind::Uint64, false)
            .with_field(2, "metadata_offsets", FieldKind::Uint64, true)
            .with_field(3, "protoclass_offsets", FieldKind::Uint64, true)
            .with_field(4, "class_count", FieldKind::Bytes, true)
    }
}

impl FixedClass for StartCompressedSection {
    const CLASS_ID: u32 = START_COMPRESSED_SECTION_CLASS_ID;
    const FULL_NAME: &'static str = "a4stream.StartCompressedSection";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME).with_field(1, "compression", FieldKind::Int64, false)
    }
}

impl FixedClass for EndCompressedSection {
    const CLASS_ID: u32 = END_COMPRESSED_SECTION_CLASS_ID;
    const FULL_NAME: &'static str = "a4stream.EndCompressedSection";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME)
    }
}

impl FixedClass for ProtoClass {
    const CLASS_ID: u32 = PROTO_CLASS_CLASS_ID;
    const FULL_NAME: &'static str = "a4stream.ProtoClass";

    fn class_schema() -> ClassSchema {
        ClassSchema::new(Self::FULL_NAME)
            .with_field(1, "class_id", FieldKind::Uint32, false)
            .with_field(2, "schema", FieldKind::Bytes, false)
    }
}
