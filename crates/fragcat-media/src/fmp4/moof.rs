//! Movie fragment (moof) inspection.
//!
//! A moof atom is read whole before inspection, so everything here operates
//! on an in-memory payload with random access. Children are matched by type
//! rather than by fixed offset, which tolerates extra or reordered sibling
//! atoms from encoders that emit more than the minimal set.

use crate::mp4::{AtomHeader, AtomType};
use crate::{Error, Result};

/// Role of a track fragment within a movie fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Video,
    Audio,
}

impl TrackRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for TrackRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered roles of the track fragments expected in each movie fragment.
///
/// The traf atoms carry no indication of which track they belong to; the
/// mapping is purely positional and coupled to the upstream encoder's
/// configuration, so it is explicit configuration here. A fragment whose
/// traf count differs from the layout fails with
/// [`Error::TrackCountMismatch`]: with the positional mapping broken there
/// is nothing sensible to guess.
#[derive(Debug, Clone)]
pub struct TrackLayout {
    roles: Vec<TrackRole>,
}

impl TrackLayout {
    /// Create a layout from the ordered track roles.
    pub fn new(roles: Vec<TrackRole>) -> Self {
        Self { roles }
    }

    /// The expected roles, in traf order.
    pub fn roles(&self) -> &[TrackRole] {
        &self.roles
    }
}

impl Default for TrackLayout {
    /// The known upstream interleaving: video traf first, audio traf second.
    fn default() -> Self {
        Self::new(vec![TrackRole::Video, TrackRole::Audio])
    }
}

/// Base decode time of one track fragment, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackBaseTime {
    /// Role assigned by the configured layout.
    pub role: TrackRole,
    /// Starting decode timestamp of the track fragment, from its tfdt.
    pub base_decode_time: u64,
}

/// Iterator over the immediate children of an atom payload.
///
/// Decodes a header at the current offset and advances by its declared size,
/// yielding the header and the child's payload sub-slice. A child that
/// overruns the payload yields [`Error::TruncatedFragment`]; header errors
/// propagate as-is. Iteration stops after the first error.
pub struct AtomChildren<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> AtomChildren<'a> {
    /// Iterate the children of `payload`.
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn fail(&mut self, err: Error) -> Option<<Self as Iterator>::Item> {
        // Poison the iterator; a framing error leaves no reliable next offset.
        self.pos = self.payload.len();
        Some(Err(err))
    }
}

impl<'a> Iterator for AtomChildren<'a> {
    type Item = Result<(AtomHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.payload.len() {
            return None;
        }

        if self.pos + AtomHeader::LEN > self.payload.len() {
            return self.fail(Error::TruncatedFragment {
                offset: self.pos,
                len: self.payload.len(),
            });
        }

        let header = match AtomHeader::parse(&self.payload[self.pos..]) {
            Ok(header) => header,
            Err(e) => return self.fail(e),
        };

        let end = self.pos + header.size as usize;
        if end > self.payload.len() {
            return self.fail(Error::TruncatedFragment {
                offset: self.pos,
                len: self.payload.len(),
            });
        }

        let child_payload = &self.payload[self.pos + AtomHeader::LEN..end];
        self.pos = end;
        Some(Ok((header, child_payload)))
    }
}

/// Extract the per-track base decode times from a moof payload.
///
/// Requires an `mfhd` child to be present and exactly as many `traf`
/// children as the layout has roles; each traf must carry a `tfdt`. Unknown
/// sibling atoms are skipped.
pub fn base_decode_times(moof_payload: &[u8], layout: &TrackLayout) -> Result<Vec<TrackBaseTime>> {
    let mut saw_mfhd = false;
    let mut times = Vec::with_capacity(layout.roles().len());

    for child in AtomChildren::new(moof_payload) {
        let (header, payload) = child?;
        match header.atom_type {
            AtomType::MFHD => saw_mfhd = true,
            AtomType::TRAF => times.push(traf_decode_time(payload)?),
            _ => {}
        }
    }

    if !saw_mfhd {
        return Err(Error::MissingAtom("mfhd"));
    }
    if times.len() != layout.roles().len() {
        return Err(Error::TrackCountMismatch {
            expected: layout.roles().len(),
            actual: times.len(),
        });
    }

    Ok(layout
        .roles()
        .iter()
        .zip(times)
        .map(|(&role, base_decode_time)| TrackBaseTime {
            role,
            base_decode_time,
        })
        .collect())
}

/// Find the tfdt in a traf payload and decode its base decode time.
///
/// tfdt payload as consumed: 4 bytes version/flags, then an 8-byte
/// big-endian decode time (the version-1 layout the upstream encoder emits).
fn traf_decode_time(traf_payload: &[u8]) -> Result<u64> {
    for child in AtomChildren::new(traf_payload) {
        let (header, payload) = child?;
        if header.atom_type != AtomType::TFDT {
            continue;
        }

        if payload.len() < 12 {
            return Err(Error::TruncatedFragment {
                offset: 12,
                len: payload.len(),
            });
        }
        return Ok(u64::from_be_bytes([
            payload[4], payload[5], payload[6], payload[7], payload[8], payload[9], payload[10],
            payload[11],
        ]));
    }

    Err(Error::MissingAtom("tfdt"))
}
