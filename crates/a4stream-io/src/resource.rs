//! Byte resources under the stream codec.
//!
//! A reader runs on any [`InputResource`]; seekability is a property of the
//! resource, queried at runtime (backward-metadata streams and `seek_to`
//! need it, plain forward iteration does not). Writers only need
//! `io::Write`; the [`CountingWriter`] wrapper supplies the byte positions
//! the footer bookkeeping needs, so non-seekable sinks work too.
//!
//! [`TrackedReader`] is the buffered layer every read goes through. Its
//! `tell()` reports the *consumed* logical position rather than the raw
//! cursor, so compression codecs layered on top can over-fill the buffer
//! without ever desynchronizing the stream position.

use std::fs::File;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};

use a4stream_core::{Error, Result};

/// A source of stream bytes, optionally seekable.
pub trait InputResource: Read + Send {
    fn seekable(&self) -> bool {
        false
    }

    fn seek_abs(&mut self, _pos: u64) -> Result<u64> {
        Err(Error::NotSeekable)
    }

    fn seek_from_end(&mut self, _back: u64) -> Result<u64> {
        Err(Error::NotSeekable)
    }
}

impl InputResource for File {
    fn seekable(&self) -> bool {
        true
    }

    fn seek_abs(&mut self, pos: u64) -> Result<u64> {
        Ok(Seek::seek(self, SeekFrom::Start(pos))?)
    }

    fn seek_from_end(&mut self, back: u64) -> Result<u64> {
        Ok(Seek::seek(self, SeekFrom::End(-(back as i64)))?)
    }
}

impl<T: AsRef<[u8]> + Send> InputResource for Cursor<T> {
    fn seekable(&self) -> bool {
        true
    }

    fn seek_abs(&mut self, pos: u64) -> Result<u64> {
        Ok(Seek::seek(self, SeekFrom::Start(pos))?)
    }

    fn seek_from_end(&mut self, back: u64) -> Result<u64> {
        Ok(Seek::seek(self, SeekFrom::End(-(back as i64)))?)
    }
}

/// Masks the seekability of any reader. Used to model pipes and sockets.
pub struct Unseekable<R>(R);

impl<R: Read + Send> Unseekable<R> {
    pub fn new(inner: R) -> Self {
        Unseekable(inner)
    }
}

impl<R: Read + Send> Read for Unseekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read + Send> InputResource for Unseekable<R> {}

const READ_BUF_SIZE: usize = 8 * 1024;

/// Buffered reader over an [`InputResource`] that tracks the consumed
/// logical position.
pub struct TrackedReader<R: InputResource> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    cap: usize,
    consumed: u64,
}

impl<R: InputResource> TrackedReader<R> {
    pub fn new(inner: R) -> Self {
        TrackedReader {
            inner,
            buf: vec![0u8; READ_BUF_SIZE].into_boxed_slice(),
            pos: 0,
            cap: 0,
            consumed: 0,
        }
    }

    /// Logical position: bytes consumed by callers, not bytes pulled from
    /// the underlying resource.
    pub fn tell(&self) -> u64 {
        self.consumed
    }

    pub fn seekable(&self) -> bool {
        self.inner.seekable()
    }

    pub fn seek_abs(&mut self, pos: u64) -> Result<u64> {
        self.pos = 0;
        self.cap = 0;
        let new_pos = self.inner.seek_abs(pos)?;
        self.consumed = new_pos;
        Ok(new_pos)
    }

    pub fn seek_from_end(&mut self, back: u64) -> Result<u64> {
        self.pos = 0;
        self.cap = 0;
        let new_pos = self.inner.seek_from_end(back)?;
        self.consumed = new_pos;
        Ok(new_pos)
    }
}

impl<R: InputResource> Read for TrackedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.cap && out.len() >= self.buf.len() {
            let n = self.inner.read(out)?;
            self.consumed += n as u64;
            return Ok(n);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: InputResource> BufRead for TrackedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.cap {
            self.cap = self.inner.read(&mut self.buf)?;
            self.pos = 0;
        }
        Ok(&self.buf[self.pos..self.cap])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.cap - self.pos);
        self.pos += amt;
        self.consumed += amt as u64;
    }
}

/// Write wrapper counting raw bytes, the writer's `tell()`.
pub struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
