//! Error types for fragcat-media.

use crate::mp4::AtomType;
use std::io;
use thiserror::Error;

/// Result type for fragcat-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fragcat-media operations.
///
/// Every variant is fatal to the read that produced it: a structural
/// mismatch means the stream's framing is already broken and further bytes
/// cannot be reliably located, so nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the input source (including a cancelled read).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Atom header bytes insufficient or internally inconsistent.
    #[error("Malformed atom header: {0}")]
    MalformedHeader(&'static str),

    /// Size field value 0 ("extends to end of stream") or 1 ("64-bit size
    /// follows"); neither is supported.
    #[error("Unsupported atom size field: {0}")]
    UnsupportedSize(u32),

    /// Stream ended before a declared byte count was available.
    #[error("Unexpected end of stream: {need} more bytes expected")]
    UnexpectedEndOfStream { need: usize },

    /// Type mismatch at a validated position in the segment protocol.
    #[error("Expected {expected} atom but got {actual}")]
    UnexpectedBoxType { expected: AtomType, actual: AtomType },

    /// Child-atom walk ran past the end of the enclosing payload.
    #[error("Truncated fragment: child at offset {offset} overruns payload of {len} bytes")]
    TruncatedFragment { offset: usize, len: usize },

    /// Required child atom absent from a fragment.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),

    /// Movie fragment carries a different number of track fragments than the
    /// configured track layout.
    #[error("Fragment has {actual} track fragments, layout expects {expected}")]
    TrackCountMismatch { expected: usize, actual: usize },

    /// Declared atom size exceeds the in-memory cap.
    #[error("Atom data size {size} exceeds maximum {max}")]
    AtomTooLarge { size: u64, max: u64 },
}
