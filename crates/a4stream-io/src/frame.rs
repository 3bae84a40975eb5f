//! Record framing: magic tokens, little-endian size words and the
//! class-id flag bit.
//!
//! A framed record is `size:u32LE [class_id:u32LE] payload`, where bit 31
//! of the size word flags that a class id follows. Records without a class
//! id belong to the stream's default content class, declared in the
//! header. The magic tokens bracket segments and are treated as opaque
//! 8-byte strings.

use std::io::{self, Read, Write};

use a4stream_core::{Error, Result};

pub const START_MAGIC: &[u8; 8] = b"A4STREAM";
pub const END_MAGIC: &[u8; 8] = b"KTHXBYE4";

/// Bit 31 of the size word: a class id follows.
pub const CLASS_ID_FLAG: u32 = 1 << 31;

/// Largest encodable payload: the 31 remaining size bits. Payloads of
/// 2 GiB and more are not supported.
pub const MAX_PAYLOAD: u64 = (1 << 31) - 1;

/// A framed record as read off the wire, before class resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub class_id: Option<u32>,
    pub payload: Vec<u8>,
}

/// Result of probing for a magic token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicCheck {
    Found,
    /// Clean end of input exactly at the token boundary.
    Eof,
}

pub fn write_magic(w: &mut impl Write, magic: &[u8; 8]) -> Result<()> {
    w.write_all(magic)?;
    Ok(())
}

/// Read an 8-byte magic token. A clean EOF before the first byte reports
/// [`MagicCheck::Eof`]; a partial token or a mismatch is an error.
pub fn read_magic(
    r: &mut impl Read,
    expected: &'static [u8; 8],
    what: &'static str,
) -> Result<MagicCheck> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(MagicCheck::Eof);
            }
            return Err(Error::Truncated(what));
        }
        filled += n;
    }
    if &buf != expected {
        return Err(Error::MagicMismatch {
            expected: std::str::from_utf8(expected).unwrap_or("magic"),
        });
    }
    Ok(MagicCheck::Found)
}

pub fn read_u32le(r: &mut impl Read, what: &'static str) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b).map_err(|e| eof_to_truncated(e, what))?;
    Ok(u32::from_le_bytes(b))
}

pub fn write_u32le(w: &mut impl Write, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Read one framed record. EOF at any point within the record is a
/// truncation error; records never legitimately end a stream.
pub fn read_record(r: &mut impl Read) -> Result<RawRecord> {
    let size = read_u32le(r, "record size")?;
    let (len, class_id) = if size & CLASS_ID_FLAG != 0 {
        (size & !CLASS_ID_FLAG, Some(read_u32le(r, "record class id")?))
    } else {
        (size, None)
    };
    if class_id == Some(0) {
        return Err(Error::InvalidStream("class id 0 on the wire".into()));
    }
    // the 31 size bits cannot express a length beyond MAX_PAYLOAD
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)
        .map_err(|e| eof_to_truncated(e, "record payload"))?;
    Ok(RawRecord { class_id, payload })
}

/// Write one framed record, setting the class-id flag iff an id is given.
pub fn write_record(w: &mut impl Write, class_id: Option<u32>, payload: &[u8]) -> Result<()> {
    if !payload_fits(payload.len() as u64) {
        return Err(Error::OversizedRecord(payload.len() as u64));
    }
    match class_id {
        Some(id) => {
            debug_assert_ne!(id, 0, "class id 0 is reserved");
            write_u32le(w, payload.len() as u32 | CLASS_ID_FLAG)?;
            write_u32le(w, id)?;
        }
        None => write_u32le(w, payload.len() as u32)?,
    }
    w.write_all(payload)?;
    Ok(())
}

/// A payload is encodable iff its length fits in the 31 size bits.
fn payload_fits(len: u64) -> bool {
    len <= MAX_PAYLOAD
}

fn eof_to_truncated(e: io::Error, what: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated(what)
    } else {
        Error::Io(e)
    }
}
