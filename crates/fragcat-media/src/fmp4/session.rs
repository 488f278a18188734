//! Segment session state machine.
//!
//! The one-time init transition is encoded in the types: a [`Segmenter`] can
//! only be turned into a [`SegmentStream`] by consuming it in
//! [`Segmenter::read_init`], so "init read exactly once, before any media"
//! holds at compile time rather than by a nullable pointer check.

use super::moof::{base_decode_times, TrackBaseTime, TrackLayout, TrackRole};
use crate::mp4::{Atom, AtomReader, AtomType};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::io::Read;
use std::sync::Arc;

/// The one-time initialization segment: codec/container configuration a
/// player needs before any fragment is decodable.
#[derive(Debug, Clone)]
pub struct InitSegment {
    /// File-type atom.
    pub ftyp: Atom,
    /// Movie configuration atom.
    pub moov: Atom,
}

impl InitSegment {
    /// Total wire length of the init segment in bytes.
    pub fn byte_len(&self) -> usize {
        self.ftyp.as_bytes().len() + self.moov.as_bytes().len()
    }
}

/// One media segment: a moof/mdat pair plus the decode timestamps pulled out
/// of the moof. Created fresh per read cycle.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    /// Fragment metadata atom.
    pub moof: Atom,
    /// Raw sample data atom.
    pub mdat: Atom,
    /// Base decode time of each track fragment, in layout order.
    pub base_decode_times: Vec<TrackBaseTime>,
}

impl MediaSegment {
    /// Base decode time of the video track fragment, if the layout has one.
    pub fn base_video_decode_time(&self) -> Option<u64> {
        self.time_for(TrackRole::Video)
    }

    /// Base decode time of the audio track fragment, if the layout has one.
    pub fn base_audio_decode_time(&self) -> Option<u64> {
        self.time_for(TrackRole::Audio)
    }

    fn time_for(&self, role: TrackRole) -> Option<u64> {
        self.base_decode_times
            .iter()
            .find(|t| t.role == role)
            .map(|t| t.base_decode_time)
    }
}

/// A media segment merged with the session's init segment into one
/// contiguous, independently decodable buffer.
#[derive(Debug, Clone)]
pub struct MergedSegment {
    /// The shared init segment the buffer was built from.
    pub init: Arc<InitSegment>,
    /// The media segment the buffer was built from.
    pub media: MediaSegment,
    /// ftyp + moov + moof + mdat wire bytes, in that order.
    pub buffer: Bytes,
}

/// Entry point of a segment session, before the init segment has been read.
pub struct Segmenter<R> {
    reader: AtomReader<R>,
    layout: TrackLayout,
}

impl<R: Read> Segmenter<R> {
    /// Create a session over a sequential byte source with the default
    /// video-then-audio track layout.
    pub fn new(source: R) -> Self {
        Self::with_layout(source, TrackLayout::default())
    }

    /// Create a session with an explicit track layout.
    pub fn with_layout(source: R, layout: TrackLayout) -> Self {
        Self {
            reader: AtomReader::new(source),
            layout,
        }
    }

    /// Read the init segment (ftyp then moov) and transition to media reads.
    ///
    /// Consumes the segmenter: the returned [`SegmentStream`] is the only
    /// handle that can read media segments, and there is no way back.
    pub fn read_init(mut self) -> Result<SegmentStream<R>> {
        let ftyp = expect_atom(&mut self.reader, AtomType::FTYP)?;
        let moov = expect_atom(&mut self.reader, AtomType::MOOV)?;

        Ok(SegmentStream {
            reader: self.reader,
            layout: self.layout,
            init: Arc::new(InitSegment { ftyp, moov }),
        })
    }
}

/// A segment session that holds its init segment and reads media segments.
///
/// The init segment is written once (on construction) and shared immutably
/// behind an `Arc` thereafter, so merged segments can be handed to a
/// consumer task without copying or locking.
#[derive(Debug)]
pub struct SegmentStream<R> {
    reader: AtomReader<R>,
    layout: TrackLayout,
    init: Arc<InitSegment>,
}

impl<R: Read> SegmentStream<R> {
    /// The session's init segment.
    pub fn init(&self) -> &InitSegment {
        &self.init
    }

    /// A shared handle to the init segment.
    pub fn init_shared(&self) -> Arc<InitSegment> {
        Arc::clone(&self.init)
    }

    /// Read the next media segment.
    ///
    /// Returns `Ok(None)` when the `mfra` trailer atom arrives: the normal
    /// end of the fragment sequence, not a fault, with no mdat following.
    /// Any atom other than `moof` or `mfra` at a segment boundary is a
    /// protocol violation.
    pub fn read_media(&mut self) -> Result<Option<MediaSegment>> {
        let moof = self.reader.read_atom()?;

        if moof.atom_type() == AtomType::MFRA {
            return Ok(None);
        }
        if moof.atom_type() != AtomType::MOOF {
            return Err(Error::UnexpectedBoxType {
                expected: AtomType::MOOF,
                actual: moof.atom_type(),
            });
        }

        let times = base_decode_times(moof.payload(), &self.layout)?;
        let mdat = expect_atom(&mut self.reader, AtomType::MDAT)?;

        Ok(Some(MediaSegment {
            moof,
            mdat,
            base_decode_times: times,
        }))
    }

    /// Merge a media segment with the stored init segment into one playable
    /// buffer.
    ///
    /// Pure concatenation of ftyp, moov, moof and mdat wire bytes, in that
    /// order. The init bytes are reused unchanged for every media segment;
    /// the buffer is recomputed per call since concatenation is cheap
    /// relative to the I/O that produced the atoms.
    pub fn merge(&self, media: MediaSegment) -> MergedSegment {
        let size = self.init.byte_len() + media.moof.as_bytes().len() + media.mdat.as_bytes().len();

        let mut buffer = BytesMut::with_capacity(size);
        buffer.extend_from_slice(self.init.ftyp.as_bytes());
        buffer.extend_from_slice(self.init.moov.as_bytes());
        buffer.extend_from_slice(media.moof.as_bytes());
        buffer.extend_from_slice(media.mdat.as_bytes());

        MergedSegment {
            init: Arc::clone(&self.init),
            media,
            buffer: buffer.freeze(),
        }
    }

    /// Read the next media segment already merged with the init segment.
    ///
    /// `Ok(None)` signals end of stream exactly like [`read_media`].
    ///
    /// [`read_media`]: Self::read_media
    pub fn read_merged(&mut self) -> Result<Option<MergedSegment>> {
        Ok(self.read_media()?.map(|media| self.merge(media)))
    }
}

fn expect_atom<R: Read>(reader: &mut AtomReader<R>, expected: AtomType) -> Result<Atom> {
    let atom = reader.read_atom()?;
    if atom.atom_type() != expected {
        return Err(Error::UnexpectedBoxType {
            expected,
            actual: atom.atom_type(),
        });
    }
    Ok(atom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::AtomHeader;
    use std::io::Cursor;

    fn atom_bytes(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(payload);
        out
    }

    fn tfdt_bytes(time: u64) -> Vec<u8> {
        let mut payload = vec![1, 0, 0, 0];
        payload.extend_from_slice(&time.to_be_bytes());
        atom_bytes(b"tfdt", &payload)
    }

    fn moof_bytes(video_time: u64, audio_time: u64) -> Vec<u8> {
        let traf_v = atom_bytes(
            b"traf",
            &[atom_bytes(b"tfhd", &[0; 8]), tfdt_bytes(video_time)].concat(),
        );
        let traf_a = atom_bytes(
            b"traf",
            &[atom_bytes(b"tfhd", &[0; 8]), tfdt_bytes(audio_time)].concat(),
        );
        atom_bytes(
            b"moof",
            &[atom_bytes(b"mfhd", &[0; 8]), traf_v, traf_a].concat(),
        )
    }

    fn raw_atom(tag: &[u8; 4], total_len: usize) -> Atom {
        // Arbitrary wire range of the requested total length (header included).
        let mut data = Vec::from(
            AtomHeader {
                atom_type: AtomType(*tag),
                size: total_len as u32,
            }
            .encode(),
        );
        data.resize(total_len, 0xAB);
        Atom {
            header: AtomHeader {
                atom_type: AtomType(*tag),
                size: total_len as u32,
            },
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_read_init_then_media() {
        let stream_bytes = [
            atom_bytes(b"ftyp", &[0x11; 8]),
            atom_bytes(b"moov", &[0x22; 12]),
            moof_bytes(1000, 2000),
            atom_bytes(b"mdat", &[0x33; 20]),
            atom_bytes(b"mfra", &[0; 4]),
        ]
        .concat();

        let mut stream = Segmenter::new(Cursor::new(stream_bytes))
            .read_init()
            .unwrap();
        assert_eq!(stream.init().ftyp.atom_type(), AtomType::FTYP);
        assert_eq!(stream.init().moov.payload().len(), 12);

        let media = stream.read_media().unwrap().unwrap();
        assert_eq!(media.base_video_decode_time(), Some(1000));
        assert_eq!(media.base_audio_decode_time(), Some(2000));
        assert_eq!(media.mdat.payload().len(), 20);

        // mfra trailer: clean end of stream, no mdat read attempted.
        assert!(stream.read_media().unwrap().is_none());
    }

    #[test]
    fn test_init_wrong_first_atom() {
        let stream_bytes = [
            atom_bytes(b"moov", &[0; 4]),
            atom_bytes(b"ftyp", &[0; 4]),
        ]
        .concat();

        let err = Segmenter::new(Cursor::new(stream_bytes))
            .read_init()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedBoxType {
                expected: AtomType::FTYP,
                actual: AtomType::MOOV
            }
        ));
    }

    #[test]
    fn test_media_requires_mdat() {
        let stream_bytes = [
            atom_bytes(b"ftyp", &[0; 4]),
            atom_bytes(b"moov", &[0; 4]),
            moof_bytes(1, 2),
            atom_bytes(b"free", &[0; 4]),
        ]
        .concat();

        let mut stream = Segmenter::new(Cursor::new(stream_bytes))
            .read_init()
            .unwrap();
        let err = stream.read_media().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedBoxType {
                expected: AtomType::MDAT,
                actual
            } if actual == AtomType(*b"free")
        ));
    }

    #[test]
    fn test_media_requires_moof() {
        let stream_bytes = [
            atom_bytes(b"ftyp", &[0; 4]),
            atom_bytes(b"moov", &[0; 4]),
            atom_bytes(b"mdat", &[0; 4]),
        ]
        .concat();

        let mut stream = Segmenter::new(Cursor::new(stream_bytes))
            .read_init()
            .unwrap();
        let err = stream.read_media().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedBoxType {
                expected: AtomType::MOOF,
                actual: AtomType::MDAT
            }
        ));
    }

    #[test]
    fn test_merge_concatenation_order() {
        // Byte ranges of 4, 6, 5 and 3 bytes merge into an 18-byte buffer
        // equal to their concatenation in ftyp, moov, moof, mdat order.
        let stream = SegmentStream {
            reader: AtomReader::new(Cursor::new(Vec::new())),
            layout: TrackLayout::default(),
            init: Arc::new(InitSegment {
                ftyp: raw_atom(b"ftyp", 4),
                moov: raw_atom(b"moov", 6),
            }),
        };
        let media = MediaSegment {
            moof: raw_atom(b"moof", 5),
            mdat: raw_atom(b"mdat", 3),
            base_decode_times: Vec::new(),
        };

        let expected: Vec<u8> = [
            stream.init.ftyp.as_bytes(),
            stream.init.moov.as_bytes(),
            media.moof.as_bytes(),
            media.mdat.as_bytes(),
        ]
        .concat();

        let merged = stream.merge(media);
        assert_eq!(merged.buffer.len(), 18);
        assert_eq!(&merged.buffer[..], &expected[..]);
        assert_eq!(merged.init.byte_len(), 10);
    }

    #[test]
    fn test_merge_reuses_init() {
        let stream_bytes = [
            atom_bytes(b"ftyp", &[0x11; 4]),
            atom_bytes(b"moov", &[0x22; 4]),
            moof_bytes(10, 20),
            atom_bytes(b"mdat", &[0x33; 4]),
            moof_bytes(30, 40),
            atom_bytes(b"mdat", &[0x44; 4]),
        ]
        .concat();

        let mut stream = Segmenter::new(Cursor::new(stream_bytes))
            .read_init()
            .unwrap();
        let init_prefix: Vec<u8> = [
            stream.init().ftyp.as_bytes(),
            stream.init().moov.as_bytes(),
        ]
        .concat();

        let first = stream.read_merged().unwrap().unwrap();
        let second = stream.read_merged().unwrap().unwrap();
        assert_eq!(&first.buffer[..init_prefix.len()], &init_prefix[..]);
        assert_eq!(&second.buffer[..init_prefix.len()], &init_prefix[..]);
        assert_eq!(second.media.base_video_decode_time(), Some(30));
        assert_eq!(second.media.base_audio_decode_time(), Some(40));
    }
}
