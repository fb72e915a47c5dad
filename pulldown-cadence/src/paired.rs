//! Frames and their flag records, kept index-aligned.
//!
//! [`PairedSequence`] is the only way the converters touch frames and flags.
//! Every operation builds one index table and applies it to both halves at
//! once, so the two can never drift apart.

use crate::error::{PulldownError, Result};
use crate::metadata::FlagRecord;
use pulldown_core::sequence::{check_index, IndexMapped, SequenceInfo, Splice};
use pulldown_core::{Frame, FrameSequence, Rational, SharedSequence};
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// A maximal run of coded indices sharing one progressive/interlaced class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Whether the run is progressive.
    pub progressive: bool,
    /// Coded index range.
    pub range: Range<usize>,
}

impl Run {
    /// Number of coded frames in the run.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Whether the run is empty. Partitioning never yields empty runs.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split coded indices into maximal progressive and interlaced runs, in
/// coded order.
pub fn partition_runs(flags: &[FlagRecord]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (i, flag) in flags.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.progressive == flag.progressive => run.range.end = i + 1,
            _ => runs.push(Run {
                progressive: flag.progressive,
                range: i..i + 1,
            }),
        }
    }
    runs
}

/// A frame sequence with one flag record per frame.
#[derive(Clone)]
pub struct PairedSequence {
    frames: SharedSequence,
    flags: Arc<[FlagRecord]>,
}

impl PairedSequence {
    /// Pair `frames` with `flags`; both must have the same length.
    pub fn new(frames: SharedSequence, flags: impl Into<Arc<[FlagRecord]>>) -> Result<Self> {
        let flags = flags.into();
        if frames.len() != flags.len() {
            return Err(PulldownError::LengthMismatch {
                frames: frames.len(),
                flags: flags.len(),
            });
        }
        Ok(Self { frames, flags })
    }

    /// The frame half.
    pub fn frames(&self) -> &SharedSequence {
        &self.frames
    }

    /// The flag half.
    pub fn flags(&self) -> &[FlagRecord] {
        &self.flags
    }

    /// Shared handle to the flags.
    pub fn shared_flags(&self) -> Arc<[FlagRecord]> {
        Arc::clone(&self.flags)
    }

    /// Static frame properties.
    pub fn info(&self) -> SequenceInfo {
        self.frames.info()
    }

    /// Number of paired frames.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Maximal progressive/interlaced runs of the current flags.
    pub fn runs(&self) -> Vec<Run> {
        partition_runs(&self.flags)
    }

    /// Output `n` is input `indices[n]`, for frames and flags alike.
    pub fn select(&self, indices: Vec<usize>, frame_rate: Option<Rational>) -> Result<Self> {
        let flags: Vec<FlagRecord> = indices
            .iter()
            .map(|&i| {
                self.flags.get(i).copied().ok_or(PulldownError::Core(
                    pulldown_core::Error::FrameOutOfRange {
                        index: i,
                        length: self.flags.len(),
                    },
                ))
            })
            .collect::<Result<_>>()?;
        let frames: SharedSequence = Arc::new(IndexMapped::new(
            Arc::clone(&self.frames),
            indices,
            frame_rate,
        )?);
        Self::new(frames, flags)
    }

    /// Repeat each index in `at` once, right after itself. The inserted flag
    /// record is `derive(original)`; the original record is kept as is.
    ///
    /// `at` must be ascending.
    pub fn duplicate(&self, at: &[usize], derive: impl Fn(&FlagRecord) -> FlagRecord) -> Result<Self> {
        if at.is_empty() {
            return Ok(self.clone());
        }
        if let Some(&bad) = at.iter().find(|&&i| i >= self.len()) {
            return Err(pulldown_core::Error::FrameOutOfRange {
                index: bad,
                length: self.len(),
            }
            .into());
        }

        let mut indices = Vec::with_capacity(self.len() + at.len());
        let mut flags = Vec::with_capacity(self.len() + at.len());
        let mut pending = at.iter().peekable();
        for (i, flag) in self.flags.iter().enumerate() {
            indices.push(i);
            flags.push(*flag);
            if pending.next_if_eq(&&i).is_some() {
                indices.push(i);
                flags.push(derive(flag));
            }
        }

        let frames: SharedSequence = Arc::new(IndexMapped::new(
            Arc::clone(&self.frames),
            indices,
            None,
        )?);
        Self::new(frames, flags)
    }

    /// Coded frames `range`, frames and flags alike.
    pub fn trim(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(pulldown_core::Error::invalid_param(format!(
                "trim range {range:?} outside {} frames",
                self.len()
            ))
            .into());
        }
        let flags = self.flags[range.clone()].to_vec();
        let frames: SharedSequence = Arc::new(IndexMapped::new(
            Arc::clone(&self.frames),
            range.collect::<Vec<_>>(),
            None,
        )?);
        Self::new(frames, flags)
    }

    /// Re-time without dropping or duplicating anything.
    pub fn retime(&self, frame_rate: Rational) -> Result<Self> {
        self.select((0..self.len()).collect(), Some(frame_rate))
    }

    /// Concatenate `parts` in order. All parts must share format and rate.
    pub fn splice(parts: Vec<PairedSequence>) -> Result<Self> {
        let flags: Vec<FlagRecord> = parts.iter().flat_map(|p| p.flags.iter().copied()).collect();
        let frames: SharedSequence =
            Arc::new(Splice::new(parts.into_iter().map(|p| p.frames).collect())?);
        Self::new(frames, flags)
    }

    /// Frame sequence with each frame's flag record stamped into its props.
    pub fn stamped(&self) -> SharedSequence {
        Arc::new(StampedSequence {
            source: Arc::clone(&self.frames),
            flags: Arc::clone(&self.flags),
        })
    }

    /// Split back into frames and flags.
    pub fn into_parts(self) -> (SharedSequence, Arc<[FlagRecord]>) {
        (self.frames, self.flags)
    }
}

impl std::fmt::Debug for PairedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairedSequence")
            .field("info", &self.frames.info())
            .field("flags", &self.flags.len())
            .finish()
    }
}

/// Frames with their flag record written into the property bag.
struct StampedSequence {
    source: SharedSequence,
    flags: Arc<[FlagRecord]>,
}

impl FrameSequence for StampedSequence {
    fn info(&self) -> SequenceInfo {
        self.source.info()
    }

    fn frame(&self, index: usize) -> pulldown_core::Result<Frame> {
        check_index(index, self.flags.len())?;
        let mut frame = self.source.frame(index)?;
        self.flags[index].stamp(&mut frame.props);
        trace!("stamped frame {} with {:?}", index, self.flags[index]);
        Ok(frame)
    }
}
