//! Video standard and aspect ratio helpers.

use pulldown_core::Rational;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broadcast standard of a source, inferred from its rate (and size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoStandard {
    /// 25 fps.
    Pal,
    /// 30000/1001 fps.
    Ntsc,
    /// 24 fps.
    Film,
    /// Anything else, identified by its rate.
    Other(Rational),
}

impl VideoStandard {
    /// Detect from the frame rate alone.
    pub fn detect(frame_rate: Rational) -> Self {
        if frame_rate == Rational::PAL {
            Self::Pal
        } else if frame_rate == Rational::NTSC {
            Self::Ntsc
        } else if frame_rate == Rational::FILM {
            Self::Film
        } else {
            Self::Other(frame_rate.reduce())
        }
    }

    /// Detect from rate and frame size: PAL must be 720x576 and NTSC
    /// 720x480, otherwise the rate is reported as is.
    pub fn detect_strict(frame_rate: Rational, width: u32, height: u32) -> Self {
        match (Self::detect(frame_rate), width, height) {
            (Self::Pal, 720, 576) => Self::Pal,
            (Self::Ntsc, 720, 480) => Self::Ntsc,
            (Self::Film, _, _) => Self::Film,
            _ => Self::Other(frame_rate.reduce()),
        }
    }

    /// Whether single-rate field matching can never be trusted, so every
    /// interlaced frame goes to the full deinterlacer.
    pub fn requires_full_rate(&self) -> bool {
        matches!(self, Self::Pal)
    }

    /// Nominal frame rate.
    pub fn frame_rate(&self) -> Rational {
        match self {
            Self::Pal => Rational::PAL,
            Self::Ntsc => Rational::NTSC,
            Self::Film => Rational::FILM,
            Self::Other(rate) => *rate,
        }
    }
}

impl fmt::Display for VideoStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pal => write!(f, "PAL"),
            Self::Ntsc => write!(f, "NTSC"),
            Self::Film => write!(f, "FILM"),
            Self::Other(rate) => write!(f, "{rate}"),
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Reduced `width:height` ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Horizontal term.
    pub width: u32,
    /// Vertical term.
    pub height: u32,
}

impl AspectRatio {
    /// Reduce `width:height`. A zero term yields `0:0`.
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self { width: 0, height: 0 };
        }
        let r = gcd(width, height);
        Self {
            width: width / r,
            height: height / r,
        }
    }

    /// Parse `w:h`.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(':')?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Storage aspect ratio of a `width` x `height` frame.
pub fn storage_aspect_ratio(width: u32, height: u32) -> AspectRatio {
    AspectRatio::new(width, height)
}

/// Pixel aspect ratio that turns the storage shape into `display`.
pub fn pixel_aspect_ratio(width: u32, height: u32, display: AspectRatio) -> AspectRatio {
    let num = u64::from(display.width) * u64::from(height);
    let den = u64::from(display.height) * u64::from(width);
    let r = gcd64(num, den).max(1);
    AspectRatio::new(
        u32::try_from(num / r).unwrap_or(u32::MAX),
        u32::try_from(den / r).unwrap_or(u32::MAX),
    )
}

fn gcd64(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd64(b, a % b)
    }
}
