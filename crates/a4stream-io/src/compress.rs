//! Compressed sections.
//!
//! A section wraps a contiguous run of body records in a codec stream.
//! The `StartCompressedSection` record is always plain; everything after
//! it, including the closing `EndCompressedSection` record, is coded.
//! When the end record has been consumed, the codec stream must be
//! exactly exhausted; for self-terminating formats (ZLIB, GZIP, LZ4
//! frame) the final drain also consumes the codec trailer so the raw
//! cursor lands on the first byte after the section.
//!
//! Seeking is only legal in the plain state.

use std::io::{self, Read, Write};
use std::mem;

use flate2::bufread::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use a4stream_core::{Codec, Error, Result};

use crate::resource::{CountingWriter, InputResource, TrackedReader};

/// Read side of the section state machine.
pub(crate) enum InputLayer<R: InputResource> {
    Plain(TrackedReader<R>),
    Zlib(ZlibDecoder<TrackedReader<R>>),
    Gzip(GzDecoder<TrackedReader<R>>),
    Snappy(snap::read::FrameDecoder<TrackedReader<R>>),
    Lz4(Box<lz4_flex::frame::FrameDecoder<TrackedReader<R>>>),
    Poisoned,
}

impl<R: InputResource> InputLayer<R> {
    pub fn new(inner: TrackedReader<R>) -> Self {
        InputLayer::Plain(inner)
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, InputLayer::Plain(_))
    }

    /// The tracked reader, available only in the plain state. Seeks and
    /// position queries go through here.
    pub fn plain(&mut self) -> Result<&mut TrackedReader<R>> {
        match self {
            InputLayer::Plain(t) => Ok(t),
            _ => Err(Error::InvalidStream(
                "operation requires a plain (uncompressed) stream position".into(),
            )),
        }
    }

    pub fn start_section(&mut self, codec: Codec) -> Result<()> {
        let plain = match mem::replace(self, InputLayer::Poisoned) {
            InputLayer::Plain(t) => t,
            other => {
                *self = other;
                return Err(Error::InvalidStream("nested compressed section".into()));
            }
        };
        *self = match codec {
            Codec::Uncompressed => InputLayer::Plain(plain),
            Codec::Zlib => InputLayer::Zlib(ZlibDecoder::new(plain)),
            Codec::Gzip => InputLayer::Gzip(GzDecoder::new(plain)),
            Codec::Snappy => InputLayer::Snappy(snap::read::FrameDecoder::new(plain)),
            Codec::Lz4 => InputLayer::Lz4(Box::new(lz4_flex::frame::FrameDecoder::new(plain))),
        };
        Ok(())
    }

    /// Close the current section after its `EndCompressedSection` record
    /// has been read. Self-terminating codecs must be at end of stream.
    pub fn end_section(&mut self) -> Result<()> {
        match mem::replace(self, InputLayer::Poisoned) {
            InputLayer::Plain(t) => {
                *self = InputLayer::Plain(t);
                Err(Error::InvalidStream(
                    "end of compressed section outside a section".into(),
                ))
            }
            InputLayer::Zlib(mut d) => {
                expect_eof(&mut d)?;
                *self = InputLayer::Plain(d.into_inner());
                Ok(())
            }
            InputLayer::Gzip(mut d) => {
                expect_eof(&mut d)?;
                *self = InputLayer::Plain(d.into_inner());
                Ok(())
            }
            InputLayer::Lz4(mut d) => {
                expect_eof(&mut *d)?;
                *self = InputLayer::Plain(d.into_inner());
                Ok(())
            }
            // The snappy frame format has no end-of-stream marker; the
            // section record protocol alone bounds it.
            InputLayer::Snappy(d) => {
                *self = InputLayer::Plain(d.into_inner());
                Ok(())
            }
            InputLayer::Poisoned => Err(Error::InvalidStream("stream layer poisoned".into())),
        }
    }

    /// Tear down any active codec without end-of-section checks. Used
    /// before seeks, which discard the position anyway.
    pub fn abandon_section(&mut self) -> Result<()> {
        match mem::replace(self, InputLayer::Poisoned) {
            InputLayer::Plain(t) => *self = InputLayer::Plain(t),
            InputLayer::Zlib(d) => *self = InputLayer::Plain(d.into_inner()),
            InputLayer::Gzip(d) => *self = InputLayer::Plain(d.into_inner()),
            InputLayer::Snappy(d) => *self = InputLayer::Plain(d.into_inner()),
            InputLayer::Lz4(d) => *self = InputLayer::Plain(d.into_inner()),
            InputLayer::Poisoned => {
                return Err(Error::InvalidStream("stream layer poisoned".into()))
            }
        }
        Ok(())
    }
}

impl<R: InputResource> Read for InputLayer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputLayer::Plain(t) => t.read(buf),
            InputLayer::Zlib(d) => d.read(buf),
            InputLayer::Gzip(d) => d.read(buf),
            InputLayer::Snappy(d) => d.read(buf),
            InputLayer::Lz4(d) => d.read(buf),
            InputLayer::Poisoned => Err(io::Error::new(
                io::ErrorKind::Other,
                "stream layer poisoned",
            )),
        }
    }
}

fn expect_eof(r: &mut impl Read) -> Result<()> {
    let mut probe = [0u8; 1];
    match r.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(Error::TrailingSectionBytes),
    }
}

/// Write side of the section state machine.
pub(crate) enum OutputLayer<W: Write> {
    Plain(CountingWriter<W>),
    Zlib(ZlibEncoder<CountingWriter<W>>),
    Gzip(GzEncoder<CountingWriter<W>>),
    Snappy(snap::write::FrameEncoder<CountingWriter<W>>),
    Lz4(Box<lz4_flex::frame::FrameEncoder<CountingWriter<W>>>),
    Poisoned,
}

impl<W: Write> OutputLayer<W> {
    pub fn new(sink: W) -> Self {
        OutputLayer::Plain(CountingWriter::new(sink))
    }

    /// The counting writer, available only in the plain state. Offset
    /// bookkeeping reads positions through here.
    pub fn plain(&mut self) -> Result<&mut CountingWriter<W>> {
        match self {
            OutputLayer::Plain(w) => Ok(w),
            _ => Err(Error::InvalidStream(
                "operation requires a plain (uncompressed) stream position".into(),
            )),
        }
    }

    pub fn start_section(&mut self, codec: Codec, level: u32) -> Result<()> {
        let plain = match mem::replace(self, OutputLayer::Poisoned) {
            OutputLayer::Plain(w) => w,
            other => {
                *self = other;
                return Err(Error::InvalidStream("nested compressed section".into()));
            }
        };
        *self = match codec {
            Codec::Uncompressed => OutputLayer::Plain(plain),
            Codec::Zlib => OutputLayer::Zlib(ZlibEncoder::new(plain, Compression::new(level.min(9)))),
            Codec::Gzip => OutputLayer::Gzip(GzEncoder::new(plain, Compression::new(level.min(9)))),
            Codec::Snappy => OutputLayer::Snappy(snap::write::FrameEncoder::new(plain)),
            Codec::Lz4 => OutputLayer::Lz4(Box::new(lz4_flex::frame::FrameEncoder::new(plain))),
        };
        Ok(())
    }

    /// Finish the current codec stream and return to the plain state,
    /// flushing all coded bytes to the raw sink.
    pub fn end_section(&mut self) -> Result<()> {
        match mem::replace(self, OutputLayer::Poisoned) {
            OutputLayer::Plain(w) => {
                *self = OutputLayer::Plain(w);
                Err(Error::InvalidStream(
                    "end of compressed section outside a section".into(),
                ))
            }
            OutputLayer::Zlib(enc) => {
                *self = OutputLayer::Plain(enc.finish()?);
                Ok(())
            }
            OutputLayer::Gzip(enc) => {
                *self = OutputLayer::Plain(enc.finish()?);
                Ok(())
            }
            OutputLayer::Snappy(mut enc) => {
                enc.flush()?;
                let w = enc.into_inner().map_err(|_| {
                    Error::InvalidStream("failed to finish snappy section".into())
                })?;
                *self = OutputLayer::Plain(w);
                Ok(())
            }
            OutputLayer::Lz4(enc) => {
                let w = enc
                    .finish()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                *self = OutputLayer::Plain(w);
                Ok(())
            }
            OutputLayer::Poisoned => Err(Error::InvalidStream("stream layer poisoned".into())),
        }
    }
}

impl<W: Write> Write for OutputLayer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputLayer::Plain(w) => w.write(buf),
            OutputLayer::Zlib(w) => w.write(buf),
            OutputLayer::Gzip(w) => w.write(buf),
            OutputLayer::Snappy(w) => w.write(buf),
            OutputLayer::Lz4(w) => w.write(buf),
            OutputLayer::Poisoned => Err(io::Error::new(
                io::ErrorKind::Other,
                "stream layer poisoned",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputLayer::Plain(w) => w.flush(),
            OutputLayer::Zlib(w) => w.flush(),
            OutputLayer::Gzip(w) => w.flush(),
            OutputLayer::Snappy(w) => w.flush(),
            OutputLayer::Lz4(w) => w.flush(),
            OutputLayer::Poisoned => Err(io::Error::new(
                io::ErrorKind::Other,
                "stream layer poisoned",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;
    use std::io::Cursor;

    use a4stream_core::ErrorKind;

    #[test]
    fn roundtrip_each_codec() {
        for codec in [Codec::Zlib, Codec::Gzip, Codec::Snappy, Codec::Lz4] {
            roundtrip_codec(codec);
        }
    }

    fn roundtrip_codec(codec: Codec) {
        let bytes = write_sectioned(codec);

        let mut input = InputLayer::new(TrackedReader::new(Cursor::new(bytes.clone())));
        let rec = frame::read_record(&mut input).unwrap();
        assert_eq!(rec.class_id, Some(103));

        input.start_section(codec).unwrap();
        for i in 0..50u32 {
            let rec = frame::read_record(&mut input).unwrap();
            assert_eq!(rec.class_id, Some(150));
            assert_eq!(rec.payload, i.to_le_bytes());
        }
        let rec = frame::read_record(&mut input).unwrap();
        assert_eq!(rec.class_id, Some(104));
        input.end_section().unwrap();

        // the raw cursor must land exactly on the plain suffix record
        let rec = frame::read_record(&mut input).unwrap();
        assert_eq!(rec.class_id, Some(101));
        assert_eq!(rec.payload, b"footer");
        assert_eq!(input.plain().unwrap().tell(), bytes.len() as u64);
    }

    fn write_sectioned(codec: Codec) -> Vec<u8> {
        let sink: Vec<u8> = Vec::new();
        let mut out = OutputLayer::new(sink);
        frame::write_record(&mut out, Some(103), b"start").unwrap();
        out.start_section(codec, 5).unwrap();
        for i in 0..50u32 {
            frame::write_record(&mut out, Some(150), &i.to_le_bytes()).unwrap();
        }
        frame::write_record(&mut out, Some(104), b"").unwrap();
        out.end_section().unwrap();
        frame::write_record(&mut out, Some(101), b"footer").unwrap();
        out.flush().unwrap();
        take_sink(out)
    }

    fn take_sink(out: OutputLayer<Vec<u8>>) -> Vec<u8> {
        match out {
            OutputLayer::Plain(w) => w.into_inner(),
            _ => panic!("section still open"),
        }
    }

    #[test]
    fn trailing_bytes_inside_section_are_rejected() {
        let mut out = OutputLayer::new(Vec::<u8>::new());
        out.start_section(Codec::Zlib, 5).unwrap();
        frame::write_record(&mut out, Some(104), b"").unwrap();
        // junk after the end record, still inside the coded stream
        out.write_all(b"junk").unwrap();
        out.end_section().unwrap();
        let bytes = take_sink(out);

        let mut input = InputLayer::new(TrackedReader::new(Cursor::new(bytes)));
        input.start_section(Codec::Zlib).unwrap();
        let rec = frame::read_record(&mut input).unwrap();
        assert_eq!(rec.class_id, Some(104));
        let err = input.end_section().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStream);
    }

    #[test]
    fn nested_sections_are_rejected() {
        let mut out = OutputLayer::new(Vec::<u8>::new());
        out.start_section(Codec::Lz4, 0).unwrap();
        assert!(out.start_section(Codec::Lz4, 0).is_err());
    }

    #[test]
    fn end_without_start_is_rejected() {
        let mut out = OutputLayer::new(Vec::<u8>::new());
        assert!(out.end_section().is_err());
        let mut input: InputLayer<Cursor<Vec<u8>>> =
            InputLayer::new(TrackedReader::new(Cursor::new(Vec::new())));
        assert!(input.end_section().is_err());
    }

    #[test]
    fn seek_requires_plain_state() {
        let bytes = write_sectioned(Codec::Zlib);
        let mut input = InputLayer::new(TrackedReader::new(Cursor::new(bytes)));
        let _ = frame::read_record(&mut input).unwrap();
        input.start_section(Codec::Zlib).unwrap();
        assert!(input.plain().is_err());
        input.abandon_section().unwrap();
        assert!(input.plain().is_ok());
    }
}
