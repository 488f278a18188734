//! Streaming atom reader.

use super::{Atom, AtomHeader};
use crate::{Error, Result};
use bytes::BytesMut;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Maximum allowed atom payload size (64 MB) to prevent OOM on malformed
/// streams.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Chunk granularity for cancellable reads.
const CANCEL_CHUNK: usize = 8 * 1024;

/// Reads atoms one at a time from a sequential, non-seekable byte source.
///
/// Holds at most one atom's bytes in memory, so an unbounded live stream can
/// be consumed with bounded memory. Each call blocks until the declared byte
/// count is available or the source fails; an atom is atomic from the
/// caller's perspective, fully read or failed, with no partial recovery.
#[derive(Debug)]
pub struct AtomReader<R> {
    reader: R,
}

impl<R: Read> AtomReader<R> {
    /// Create a new atom reader over a byte source.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Consume exactly one atom (header + payload) from the source.
    ///
    /// A short read or end-of-stream before the declared size is available
    /// yields [`Error::UnexpectedEndOfStream`]; header decode errors
    /// propagate unchanged.
    pub fn read_atom(&mut self) -> Result<Atom> {
        let mut header_buf = [0u8; AtomHeader::LEN];
        read_exact(&mut self.reader, &mut header_buf)?;

        let header = AtomHeader::parse(&header_buf)?;

        let payload_size = header.payload_size();
        if payload_size as u64 > MAX_ATOM_DATA_SIZE {
            return Err(Error::AtomTooLarge {
                size: payload_size as u64,
                max: MAX_ATOM_DATA_SIZE,
            });
        }

        // Keep the raw header bytes in front of the payload: downstream
        // concatenation needs the full wire range.
        let mut data = BytesMut::with_capacity(header.size as usize);
        data.extend_from_slice(&header_buf);
        data.resize(header.size as usize, 0);
        read_exact(&mut self.reader, &mut data[AtomHeader::LEN..])?;

        Ok(Atom {
            header,
            data: data.freeze(),
        })
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEndOfStream { need: buf.len() }
        } else {
            Error::Io(e)
        }
    })
}

/// Shared flag for interrupting a blocked read.
///
/// Clone freely; any clone can cancel. The next chunk boundary inside a
/// [`CancelReader`] observes the flag and fails the in-flight read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel all readers holding a clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// `Read` adapter that checks a [`CancelToken`] between bounded chunks.
///
/// A live pipe may block indefinitely between fragments; wrapping it in a
/// `CancelReader` lets the driver abort the session without killing the
/// process. A cancelled read surfaces as an I/O error on the current atom.
pub struct CancelReader<R> {
    inner: R,
    token: CancelToken,
}

impl<R: Read> CancelReader<R> {
    /// Wrap a source with the given token.
    pub fn new(inner: R, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<R: Read> Read for CancelReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(io::Error::other("stream cancelled"));
        }
        let cap = buf.len().min(CANCEL_CHUNK);
        self.inner.read(&mut buf[..cap])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::AtomType;
    use std::io::Cursor;

    fn atom_bytes(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_read_single_atom() {
        let wire = atom_bytes(b"ftyp", &[0xAA; 16]);
        let mut reader = AtomReader::new(Cursor::new(wire.clone()));

        let atom = reader.read_atom().unwrap();
        assert_eq!(atom.atom_type(), AtomType::FTYP);
        assert_eq!(atom.payload().len(), 16);
        assert_eq!(atom.as_bytes(), &wire[..]);
    }

    #[test]
    fn test_eof_at_header() {
        let mut reader = AtomReader::new(Cursor::new(vec![0u8, 0, 0]));
        let err = reader.read_atom().unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfStream { .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let mut wire = atom_bytes(b"mdat", &[1, 2, 3, 4, 5, 6]);
        wire.truncate(wire.len() - 2);
        let mut reader = AtomReader::new(Cursor::new(wire));
        let err = reader.read_atom().unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfStream { .. }));
    }

    #[test]
    fn test_unsupported_size_consumes_only_header() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u32.to_be_bytes());
        wire.extend_from_slice(b"mdat");
        wire.extend_from_slice(&[0xEE; 4]); // must remain unread

        let mut reader = AtomReader::new(Cursor::new(wire));
        let err = reader.read_atom().unwrap_err();
        assert!(matches!(err, Error::UnsupportedSize(0)));
        assert_eq!(reader.into_inner().position(), 8);
    }

    #[test]
    fn test_oversized_atom_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(128 * 1024 * 1024u32).to_be_bytes());
        wire.extend_from_slice(b"mdat");

        let mut reader = AtomReader::new(Cursor::new(wire));
        let err = reader.read_atom().unwrap_err();
        assert!(matches!(err, Error::AtomTooLarge { .. }));
    }

    #[test]
    fn test_cancelled_read_fails() {
        let token = CancelToken::new();
        token.cancel();

        let wire = atom_bytes(b"moof", &[0; 8]);
        let mut reader = AtomReader::new(CancelReader::new(Cursor::new(wire), token));
        let err = reader.read_atom().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_cancel_before_payload() {
        // Token flips after the header chunk; payload read must fail.
        let token = CancelToken::new();
        let wire = atom_bytes(b"mdat", &[0x11; 32]);

        struct FlipAfterFirst<R> {
            inner: R,
            token: CancelToken,
            reads: usize,
        }
        impl<R: Read> Read for FlipAfterFirst<R> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.reads += 1;
                if self.reads == 2 {
                    self.token.cancel();
                }
                let n = buf.len().min(8);
                self.inner.read(&mut buf[..n])
            }
        }

        let source = FlipAfterFirst {
            inner: Cursor::new(wire),
            token: token.clone(),
            reads: 0,
        };
        let mut reader = AtomReader::new(CancelReader::new(source, token));
        assert!(reader.read_atom().is_err());
    }
}
