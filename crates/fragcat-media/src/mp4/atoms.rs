//! Atom definitions and header parsing.

use crate::{Error, Result};
use bytes::Bytes;

/// Four-character atom type code.
///
/// Compared byte-for-byte; not necessarily valid ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MOOF: Self = Self(*b"moof");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MFHD: Self = Self(*b"mfhd");
    pub const TRAF: Self = Self(*b"traf");
    pub const TFHD: Self = Self(*b"tfhd");
    pub const TFDT: Self = Self(*b"tfdt");
    pub const MFRA: Self = Self(*b"mfra");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed atom header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    /// Atom type code.
    pub atom_type: AtomType,
    /// Total atom size including the header itself.
    pub size: u32,
}

impl AtomHeader {
    /// Encoded header length in bytes.
    pub const LEN: usize = 8;

    /// Decode a header from the first 8 bytes of `buf`.
    ///
    /// Size values 0 (extends to end of stream) and 1 (64-bit size in a
    /// following field) are rejected as unsupported; 2..=7 cannot hold the
    /// header itself and are rejected as malformed.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Error::MalformedHeader("fewer than 8 bytes"));
        }

        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        match size {
            0 | 1 => return Err(Error::UnsupportedSize(size)),
            2..=7 => return Err(Error::MalformedHeader("size smaller than header")),
            _ => {}
        }

        let atom_type = AtomType::from_bytes([buf[4], buf[5], buf[6], buf[7]]);

        Ok(Self { atom_type, size })
    }

    /// Encode the header back to its 8-byte wire form.
    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&self.size.to_be_bytes());
        out[4..].copy_from_slice(&self.atom_type.0);
        out
    }

    /// Payload size (total size minus the header).
    pub fn payload_size(&self) -> usize {
        self.size as usize - Self::LEN
    }
}

/// A complete atom: structured header plus the full header-inclusive bytes.
///
/// Both views are needed downstream: the header for type checks, the raw
/// bytes for concatenation into playable buffers. Immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Decoded header.
    pub header: AtomHeader,
    /// Full byte range of the atom, header included.
    pub data: Bytes,
}

impl Atom {
    /// Atom type code.
    pub fn atom_type(&self) -> AtomType {
        self.header.atom_type
    }

    /// The payload bytes (everything after the 8-byte header).
    pub fn payload(&self) -> &[u8] {
        &self.data[AtomHeader::LEN..]
    }

    /// The full atom bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
