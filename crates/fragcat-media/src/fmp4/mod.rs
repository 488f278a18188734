//! Fragmented MP4 (fMP4) segment reassembly.
//!
//! This module contains the pieces that understand fragment structure on top
//! of raw atom framing:
//! - Movie-fragment inspection (child iteration, per-track base decode times)
//! - The segment session turning a live stream into init/media/merged segments

mod moof;
mod session;

pub use moof::{base_decode_times, AtomChildren, TrackBaseTime, TrackLayout, TrackRole};
pub use session::{InitSegment, MediaSegment, MergedSegment, SegmentStream, Segmenter};
