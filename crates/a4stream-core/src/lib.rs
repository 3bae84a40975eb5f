//! Core types for the A4 stream format.
//!
//! A4 is a self-describing, seekable container for long sequences of
//! structured records. This crate holds everything the codec needs to know
//! about messages without doing any I/O: the built-in control records, the
//! in-stream schema descriptor model, dynamic message decoding, the class
//! id registries and the read-side envelope. The companion crate
//! `a4stream-io` implements the actual stream reader and writer on top.

pub mod error;
pub mod message;
pub mod records;
pub mod registry;
pub mod schema;
pub mod testing;

pub use error::{Error, ErrorKind, Result};
pub use message::{A4Message, AnyMessage, Envelope, FixedClass};
pub use records::{
    ClassCount, Codec, EndCompressedSection, ProtoClass, StartCompressedSection, StreamFooter,
    StreamHeader, A4_VERSION, FIRST_CONTENT_CLASS_ID, FIRST_METADATA_CLASS_ID,
};
pub use registry::{
    compiled_class_by_id, compiled_class_by_name, register_class, ClassEntry, ClassPool,
};
pub use schema::{ClassSchema, DynamicMessage, FieldKind, FieldSchema, FieldValue};
