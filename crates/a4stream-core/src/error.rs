//! Error types for the A4 stream format.
//!
//! Every failure an A4 stream can produce maps onto one variant here, and
//! all operations in both crates return `Result<T>` aliased to
//! `Result<T, Error>` so callers can propagate with `?`.
//!
//! Errors are terminal for the stream that produced them: a reader that
//! returned an error keeps returning the error envelope, a writer refuses
//! further writes. There is no retry or recovery below the stream level.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream: {0}")]
    Truncated(&'static str),

    #[error("bad magic bytes, expected {expected}")]
    MagicMismatch { expected: &'static str },

    #[error("unsupported A4 stream version {0} (expected 2)")]
    VersionMismatch(u32),

    #[error("unknown class id {0}")]
    UnknownClassId(u32),

    #[error("unknown compression codec id {0}")]
    UnknownCodec(i32),

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("seek target out of range: segment {segment}, metadata {metadata}")]
    InvalidSeekTarget { segment: usize, metadata: i64 },

    #[error("payload decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("compressed section did not end at a codec boundary")]
    TrailingSectionBytes,

    #[error("record of {0} bytes exceeds the payload limit")]
    OversizedRecord(u64),

    #[error("no class ids left to assign")]
    ClassIdSpaceExhausted,

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("stream is closed or in a failed state")]
    Closed,

    #[error("duplicate input: {0}")]
    DuplicateInput(String),
}

/// Lightweight projection of [`Error`] carried by the error envelope.
///
/// The full error stays with the stream that failed (it owns I/O sources
/// that are neither `Clone` nor `Copy`); the envelope only reports which
/// failure class terminated the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Truncation,
    MagicMismatch,
    VersionMismatch,
    UnknownClassId,
    UnknownCodec,
    NotSeekable,
    InvalidSeekTarget,
    SchemaParse,
    InvalidStream,
    Closed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                ErrorKind::Truncation
            }
            Error::Io(_) => ErrorKind::Io,
            Error::Truncated(_) => ErrorKind::Truncation,
            Error::MagicMismatch { .. } => ErrorKind::MagicMismatch,
            Error::VersionMismatch(_) => ErrorKind::VersionMismatch,
            Error::UnknownClassId(_) => ErrorKind::UnknownClassId,
            Error::UnknownCodec(_) => ErrorKind::UnknownCodec,
            Error::NotSeekable => ErrorKind::NotSeekable,
            Error::InvalidSeekTarget { .. } => ErrorKind::InvalidSeekTarget,
            Error::Decode(_) => ErrorKind::SchemaParse,
            Error::TrailingSectionBytes
            | Error::OversizedRecord(_)
            | Error::ClassIdSpaceExhausted
            | Error::InvalidStream(_)
            | Error::DuplicateInput(_) => ErrorKind::InvalidStream,
            Error::Closed => ErrorKind::Closed,
        }
    }
}
