//! Per-frame reconstruction decisions.
//!
//! [`classify`] is the pure base decision from a frame's flag record and
//! its observed field parity. [`DecisionPolicy`] refines it with the global
//! context: the video standard, the requested rate divisor, and finally the
//! field matcher's own combed signal.

use crate::metadata::FlagRecord;
use crate::standard::VideoStandard;
use pulldown_core::FieldBased;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a frame has to be reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameClass {
    /// Already a whole frame; pass through.
    Progressive,
    /// Interlaced, cheap field matching should suffice.
    NeedsFieldMatch,
    /// Interlaced, needs the motion-adaptive deinterlacer.
    NeedsFullDeinterlace,
}

impl FrameClass {
    /// Short name, also used as the stamped frame property value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progressive => "progressive",
            Self::NeedsFieldMatch => "field-match",
            Self::NeedsFullDeinterlace => "deinterlace",
        }
    }

    /// Whether the frame needs any reconstruction at all.
    pub fn is_interlaced(&self) -> bool {
        !matches!(self, Self::Progressive)
    }
}

impl fmt::Display for FrameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base classification.
///
/// Progressively coded pictures, and pictures whose container signals a
/// whole frame, need nothing. Everything else is interlaced and starts out
/// as a field-matching candidate.
pub fn classify(flag: &FlagRecord, field_based: FieldBased) -> FrameClass {
    if flag.progressive || !field_based.is_interlaced() {
        FrameClass::Progressive
    } else {
        FrameClass::NeedsFieldMatch
    }
}

/// Global context for refining the base classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    /// Source video standard.
    pub standard: VideoStandard,
    /// Requested rate divisor; 2 is single rate, 1 is double rate.
    pub fps_divisor: u32,
}

impl DecisionPolicy {
    /// Divisor producing one output frame per input frame.
    pub const SINGLE_RATE_DIVISOR: u32 = 2;

    /// Create a policy.
    pub fn new(standard: VideoStandard, fps_divisor: u32) -> Self {
        Self {
            standard,
            fps_divisor,
        }
    }

    /// Whether interlaced frames skip field matching altogether.
    pub fn forces_full_deinterlace(&self) -> bool {
        self.standard.requires_full_rate() || self.fps_divisor != Self::SINGLE_RATE_DIVISOR
    }

    /// Refine a base classification with the standard and divisor.
    pub fn decide(&self, base: FrameClass) -> FrameClass {
        match base {
            FrameClass::NeedsFieldMatch if self.forces_full_deinterlace() => {
                FrameClass::NeedsFullDeinterlace
            }
            other => other,
        }
    }

    /// Base classification followed by [`decide`](Self::decide).
    pub fn classify(&self, flag: &FlagRecord, field_based: FieldBased) -> FrameClass {
        self.decide(classify(flag, field_based))
    }

    /// Final decision once the field matcher has reported on the frame.
    pub fn after_match(&self, class: FrameClass, combed: bool) -> FrameClass {
        match class {
            FrameClass::NeedsFieldMatch if combed => FrameClass::NeedsFullDeinterlace,
            other => other,
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(VideoStandard::Ntsc, Self::SINGLE_RATE_DIVISOR)
    }
}
