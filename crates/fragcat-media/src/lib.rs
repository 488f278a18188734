//! Fragcat-Media: ISO-BMFF atom parsing and fMP4 segment reassembly
//!
//! This crate turns a fragmented MP4/QuickTime byte stream delivered
//! incrementally (a live encoder pipe, a growing file) into self-contained,
//! independently playable segments.
//!
//! # Modules
//!
//! - `mp4` - Atom (box) header decoding and the streaming atom reader
//! - `fmp4` - Movie-fragment inspection and the segment session
//!
//! # Architecture
//!
//! The stream is consumed strictly in order, one atom at a time:
//!
//! 1. [`Segmenter::read_init`] reads the one-time `ftyp` + `moov` pair and
//!    hands back a [`SegmentStream`], the only way to obtain one, so the
//!    init-before-media ordering is enforced at compile time.
//! 2. [`SegmentStream::read_media`] reads each `moof` + `mdat` pair, walking
//!    the moof's children to pull out per-track base decode times. An `mfra`
//!    trailer atom yields `Ok(None)`: normal end of stream, not a fault.
//! 3. [`SegmentStream::merge`] concatenates `ftyp`+`moov`+`moof`+`mdat` into
//!    one buffer a player can decode on its own.

pub mod error;
pub mod fmp4;
pub mod mp4;

pub use error::{Error, Result};
pub use fmp4::{
    InitSegment, MediaSegment, MergedSegment, SegmentStream, Segmenter, TrackBaseTime,
    TrackLayout, TrackRole,
};
pub use mp4::{Atom, AtomHeader, AtomReader, AtomType, CancelReader, CancelToken};
