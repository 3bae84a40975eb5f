//! Reading and writing A4 streams.
//!
//! A4 is a self-describing, seekable container format for long sequences
//! of structured records, built for workloads that stream millions of
//! messages to disk with optional block compression while keeping the
//! ability to seek to metadata boundaries and to concatenate files.
//!
//! ## Stream layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ START_MAGIC "A4STREAM" (8 bytes)                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ StreamHeader record                                          │
//! │ - a4_version (must be 2)                                     │
//! │ - metadata direction, default content/metadata class ids     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body records                                                 │
//! │ - content and metadata messages                              │
//! │ - ProtoClass descriptors for dynamically described classes   │
//! │ - StartCompressedSection ... EndCompressedSection brackets   │
//! │   (ZLIB / GZIP / SNAPPY / LZ4 coded regions)                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ StreamFooter record                                          │
//! │ - interior size, metadata offsets, protoclass offsets,       │
//! │   per-class counts                                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ footer_size:u32LE │ END_MAGIC "KTHXBYE4" (8 bytes)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each record is `size:u32LE [class_id:u32LE] payload`; bit 31 of the
//! size word flags the class id. Concatenating valid files yields a valid
//! file: the footer's byte size sits directly before `END_MAGIC`, so a
//! reader can walk the footer chain backward and enumerate every segment
//! without an external index.
//!
//! ## Reading and writing
//!
//! ```no_run
//! use a4stream_core::testing::{TestEvent, TestMetaData};
//! use a4stream_core::{Codec, Envelope};
//! use a4stream_io::{InputStream, OutputStream};
//!
//! # fn main() -> a4stream_core::Result<()> {
//! a4stream_core::testing::register();
//!
//! let mut writer = OutputStream::create("events.a4", "demo")?;
//! writer.set_forward_metadata();
//! writer.set_compression(Codec::Zlib, 5);
//! writer.declare_content_class::<TestEvent>();
//! writer.declare_metadata_class::<TestMetaData>();
//! writer.metadata(&TestMetaData { meta_data: 1 })?;
//! for i in 0..500 {
//!     writer.write(&TestEvent { event_number: 1000 + i })?;
//! }
//! writer.close()?;
//!
//! let mut reader = InputStream::open("events.a4")?;
//! while let Envelope::Message(msg) = reader.next() {
//!     let event = msg.get::<TestEvent>().unwrap();
//!     let run = reader.current_metadata().and_then(|m| m.get::<TestMetaData>());
//!     println!("event {} in run {:?}", event.event_number, run.map(|m| m.meta_data));
//! }
//! assert!(reader.end());
//! # Ok(())
//! # }
//! ```

pub mod frame;
pub mod input;
pub mod reader;
pub mod resource;
pub mod writer;

mod compress;

pub use input::InputSet;
pub use reader::InputStream;
pub use resource::{CountingWriter, InputResource, TrackedReader, Unseekable};
pub use writer::OutputStream;

pub use a4stream_core::{Codec, Envelope};
