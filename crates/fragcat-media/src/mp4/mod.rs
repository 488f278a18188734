//! ISO-BMFF atom parsing.
//!
//! This module provides the wire-level pieces: the 8-byte atom header
//! decoder and a streaming reader that consumes exactly one atom per call
//! from a non-seekable byte source.

mod atoms;
mod reader;

pub use atoms::{Atom, AtomHeader, AtomType};
pub use reader::{AtomReader, CancelReader, CancelToken};
