//! Lazy, randomly accessible frame sequences.
//!
//! A [`FrameSequence`] produces frame `n` on demand. Combinators in this
//! module never copy pixel data up front: they hold the upstream sequence
//! and an index table, and resolve each request when it is pulled. Any
//! index may be requested any number of times and in any order.

use crate::error::{Error, Result};
use crate::frame::{Frame, PixelFormat};
use crate::rational::Rational;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Static properties of a frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of produced frames.
    pub format: PixelFormat,
    /// Nominal frame rate.
    pub frame_rate: Rational,
    /// Number of frames.
    pub length: usize,
}

impl SequenceInfo {
    /// Copy of this info with a different length.
    pub fn with_length(self, length: usize) -> Self {
        Self { length, ..self }
    }

    /// Copy of this info with a different frame rate.
    pub fn with_frame_rate(self, frame_rate: Rational) -> Self {
        Self { frame_rate, ..self }
    }

    /// Whether frames of both sequences can be mixed in one stream.
    pub fn is_compatible(&self, other: &SequenceInfo) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.frame_rate == other.frame_rate
    }
}

impl fmt::Display for SequenceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} @ {} fps, {} frames",
            self.width, self.height, self.format, self.frame_rate, self.length
        )
    }
}

/// A source of frames with random access.
pub trait FrameSequence: Send + Sync {
    /// Static sequence properties.
    fn info(&self) -> SequenceInfo;

    /// Produce frame `index`.
    fn frame(&self, index: usize) -> Result<Frame>;

    /// Number of frames.
    fn len(&self) -> usize {
        self.info().length
    }

    /// Whether the sequence has no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reference-counted sequence handed between pipeline stages.
pub type SharedSequence = Arc<dyn FrameSequence>;

/// Check `index` against `length`.
pub fn check_index(index: usize, length: usize) -> Result<()> {
    if index < length {
        Ok(())
    } else {
        Err(Error::FrameOutOfRange { index, length })
    }
}

/// An in-memory sequence of already decoded frames.
pub struct VecSequence {
    frames: Vec<Frame>,
    info: SequenceInfo,
}

impl VecSequence {
    /// Create a sequence from decoded frames.
    ///
    /// All frames must share the dimensions and format of the first one.
    pub fn new(frames: Vec<Frame>, frame_rate: Rational) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| Error::invalid_param("sequence needs at least one frame"))?;
        let info = SequenceInfo {
            width: first.width(),
            height: first.height(),
            format: first.format(),
            frame_rate,
            length: frames.len(),
        };
        if let Some(bad) = frames.iter().position(|f| {
            f.width() != info.width || f.height() != info.height || f.format() != info.format
        }) {
            return Err(Error::format_mismatch(format!(
                "frame {bad} does not match {}x{} {}",
                info.width, info.height, info.format
            )));
        }
        Ok(Self { frames, info })
    }

    /// Wrap into a shared sequence.
    pub fn shared(self) -> SharedSequence {
        Arc::new(self)
    }
}

impl FrameSequence for VecSequence {
    fn info(&self) -> SequenceInfo {
        self.info
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        check_index(index, self.frames.len())?;
        Ok(self.frames[index].clone())
    }
}

/// Output frame `n` is upstream frame `indices[n]`.
///
/// Covers selection, duplication and trimming; optionally re-times the
/// result without touching any frame.
pub struct IndexMapped {
    source: SharedSequence,
    indices: Arc<[usize]>,
    info: SequenceInfo,
}

impl IndexMapped {
    /// Build an index-mapped view. Every index is validated here, so a bad
    /// table is rejected before any frame is pulled.
    pub fn new(
        source: SharedSequence,
        indices: impl Into<Arc<[usize]>>,
        frame_rate: Option<Rational>,
    ) -> Result<Self> {
        let indices = indices.into();
        let upstream = source.info();
        if let Some(&bad) = indices.iter().find(|&&i| i >= upstream.length) {
            return Err(Error::FrameOutOfRange {
                index: bad,
                length: upstream.length,
            });
        }
        let info = SequenceInfo {
            frame_rate: frame_rate.unwrap_or(upstream.frame_rate),
            length: indices.len(),
            ..upstream
        };
        Ok(Self {
            source,
            indices,
            info,
        })
    }
}

impl FrameSequence for IndexMapped {
    fn info(&self) -> SequenceInfo {
        self.info
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        check_index(index, self.indices.len())?;
        self.source.frame(self.indices[index])
    }
}

/// Concatenation of sequences sharing one format and frame rate.
pub struct Splice {
    parts: Vec<SharedSequence>,
    /// Start offset of each part in the output.
    starts: Vec<usize>,
    info: SequenceInfo,
}

impl Splice {
    /// Join `parts` in order.
    ///
    /// Empty parts are accepted and contribute no frames, but still have to
    /// agree on format and rate.
    pub fn new(parts: Vec<SharedSequence>) -> Result<Self> {
        let first = parts
            .first()
            .map(|p| p.info())
            .ok_or_else(|| Error::invalid_param("splice needs at least one part"))?;

        let mut starts = Vec::with_capacity(parts.len());
        let mut length = 0;
        for (i, part) in parts.iter().enumerate() {
            let info = part.info();
            if !info.is_compatible(&first) {
                return Err(Error::format_mismatch(format!(
                    "splice part {i} is {info}, expected {first}"
                )));
            }
            starts.push(length);
            length += info.length;
        }

        Ok(Self {
            parts,
            starts,
            info: first.with_length(length),
        })
    }
}

impl FrameSequence for Splice {
    fn info(&self) -> SequenceInfo {
        self.info
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        check_index(index, self.info.length)?;
        // Last part starting at or before index; an empty part always shares
        // its start with the part after it, so it is never picked.
        let part = self.starts.partition_point(|&s| s <= index) - 1;
        trace!("splice frame {} -> part {}", index, part);
        self.parts[part].frame(index - self.starts[part])
    }
}

/// Indices kept by selecting `offsets` from every block of `cycle` frames.
///
/// A trailing partial block keeps only the offsets that fall inside it.
pub fn select_every_indices(length: usize, cycle: usize, offsets: &[usize]) -> Vec<usize> {
    if cycle == 0 {
        return Vec::new();
    }
    (0..length)
        .step_by(cycle)
        .flat_map(|start| offsets.iter().map(move |&o| start + o))
        .filter(|&i| i < length)
        .collect()
}

/// Keep `offsets` out of every `cycle` frames; the rate scales by
/// `offsets.len() / cycle`.
pub fn select_every(
    source: SharedSequence,
    cycle: usize,
    offsets: &[usize],
) -> Result<SharedSequence> {
    if cycle == 0 || offsets.is_empty() {
        return Err(Error::invalid_param("select_every needs a cycle and offsets"));
    }
    if let Some(bad) = offsets.iter().find(|&&o| o >= cycle) {
        return Err(Error::invalid_param(format!(
            "offset {bad} outside cycle of {cycle}"
        )));
    }
    let info = source.info();
    let indices = select_every_indices(info.length, cycle, offsets);
    let rate = info
        .frame_rate
        .scale(offsets.len() as i64, cycle as i64);
    Ok(Arc::new(IndexMapped::new(source, indices, Some(rate))?))
}

/// Re-time a sequence without dropping or duplicating frames.
pub fn assume_fps(source: SharedSequence, frame_rate: Rational) -> Result<SharedSequence> {
    let indices: Vec<usize> = (0..source.len()).collect();
    Ok(Arc::new(IndexMapped::new(source, indices, Some(frame_rate))?))
}

/// Frames `start..end` of `source`.
pub fn trim(source: SharedSequence, start: usize, end: usize) -> Result<SharedSequence> {
    if start > end {
        return Err(Error::invalid_param(format!("trim range {start}..{end}")));
    }
    let indices: Vec<usize> = (start..end).collect();
    Ok(Arc::new(IndexMapped::new(source, indices, None)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> SharedSequence {
        let frames = (0..count)
            .map(|i| {
                let mut frame = Frame::new(16, 16, PixelFormat::Gray8);
                frame.plane_mut(0).unwrap().fill(i as u8);
                frame
            })
            .collect();
        VecSequence::new(frames, Rational::NTSC).unwrap().shared()
    }

    fn value(seq: &SharedSequence, index: usize) -> u8 {
        seq.frame(index).unwrap().plane(0).unwrap()[0]
    }

    #[test]
    fn test_vec_sequence_out_of_range() {
        let seq = numbered(3);
        assert_eq!(seq.len(), 3);
        assert!(matches!(
            seq.frame(3),
            Err(Error::FrameOutOfRange { index: 3, length: 3 })
        ));
    }

    #[test]
    fn test_vec_sequence_rejects_mixed_sizes() {
        let frames = vec![
            Frame::new(16, 16, PixelFormat::Gray8),
            Frame::new(32, 16, PixelFormat::Gray8),
        ];
        assert!(matches!(
            VecSequence::new(frames, Rational::PAL),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_select_every_indices() {
        assert_eq!(
            select_every_indices(12, 5, &[0, 1, 2, 3]),
            vec![0, 1, 2, 3, 5, 6, 7, 8, 10, 11]
        );
        assert_eq!(select_every_indices(7, 5, &[4, 0]), vec![4, 0, 5]);
    }

    #[test]
    fn test_select_every_rate_and_frames() {
        let seq = select_every(numbered(10), 5, &[0, 1, 2, 3]).unwrap();
        assert_eq!(seq.len(), 8);
        assert_eq!(seq.info().frame_rate, Rational::NTSC_FILM);
        assert_eq!(value(&seq, 4), 5);
        assert_eq!(value(&seq, 7), 8);
    }

    #[test]
    fn test_select_every_rejects_bad_offsets() {
        assert!(select_every(numbered(10), 5, &[]).is_err());
        assert!(select_every(numbered(10), 5, &[5]).is_err());
    }

    #[test]
    fn test_index_mapped_duplicates() {
        let seq: SharedSequence =
            Arc::new(IndexMapped::new(numbered(3), vec![0, 1, 1, 2], None).unwrap());
        assert_eq!(seq.len(), 4);
        assert_eq!(value(&seq, 1), 1);
        assert_eq!(value(&seq, 2), 1);
        assert_eq!(value(&seq, 3), 2);
    }

    #[test]
    fn test_index_mapped_validates_eagerly() {
        assert!(matches!(
            IndexMapped::new(numbered(3), vec![0, 3], None),
            Err(Error::FrameOutOfRange { index: 3, length: 3 })
        ));
    }

    #[test]
    fn test_splice_with_empty_parts() {
        let a = trim(numbered(10), 0, 3).unwrap();
        let empty = trim(numbered(10), 5, 5).unwrap();
        let b = trim(numbered(10), 6, 8).unwrap();
        let seq: SharedSequence = Arc::new(Splice::new(vec![a, empty, b]).unwrap());
        assert_eq!(seq.len(), 5);
        assert_eq!(value(&seq, 2), 2);
        assert_eq!(value(&seq, 3), 6);
        assert_eq!(value(&seq, 4), 7);
    }

    #[test]
    fn test_splice_rejects_rate_mismatch() {
        let a = numbered(2);
        let b = assume_fps(numbered(2), Rational::PAL).unwrap();
        assert!(matches!(
            Splice::new(vec![a, b]),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_splice_accepts_equivalent_rates() {
        let progressive = assume_fps(numbered(4), Rational::NTSC.scale(4, 5)).unwrap();
        let decimated = select_every(numbered(10), 5, &[0, 1, 2, 3]).unwrap();
        let seq = Splice::new(vec![progressive, decimated]).unwrap();
        assert_eq!(seq.len(), 12);
        assert_eq!(seq.info().frame_rate, Rational::NTSC_FILM);
    }
}
