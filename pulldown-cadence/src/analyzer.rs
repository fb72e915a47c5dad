//! Pulldown cadence detection.
//!
//! Two separate policies live here:
//!
//! - [`analyze`] is a best-effort statistical detector. It looks at the
//!   spacing of repeat-first-field markers and takes the most common one, so
//!   a few outliers (edits, broken cadence at section joins) are tolerated.
//! - [`linear_cycle`] is strict. It is used where decimation must be exact
//!   and fails with the offending intervals if the spacing is not uniform.

use crate::error::{PulldownError, Result};
use crate::metadata::FlagRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Repeating pulldown cadence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cadence {
    /// Cycle length in coded frames; 0 when no pulldown was found.
    pub cycle_length: usize,
    /// Display pattern, e.g. `[2, 3]` for classic telecine.
    pub pattern: Vec<u8>,
}

impl Cadence {
    /// No pulldown.
    pub fn none() -> Self {
        Self::default()
    }

    /// Cadence with the conventional pattern for `cycle_length`.
    pub fn from_cycle(cycle_length: usize) -> Self {
        Self {
            cycle_length,
            pattern: pattern_for(cycle_length),
        }
    }

    /// Whether a cadence was detected.
    pub fn is_detected(&self) -> bool {
        self.cycle_length > 0
    }

    /// Pattern joined with `:`, e.g. `"2:3"`. Empty when undetected.
    pub fn pattern_string(&self) -> String {
        self.pattern
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detected() {
            write!(f, "{} (cycle {})", self.pattern_string(), self.cycle_length)
        } else {
            write!(f, "none")
        }
    }
}

/// `cycle / 2` twos, the last one turned into a three for odd cycles.
fn pattern_for(cycle_length: usize) -> Vec<u8> {
    let mut pattern = vec![2u8; cycle_length / 2];
    if cycle_length % 2 == 1 {
        if let Some(last) = pattern.last_mut() {
            *last = 3;
        }
    }
    pattern
}

/// Differences of consecutive marker pairs `(m[0], m[1]), (m[2], m[3]), ...`.
///
/// A trailing unpaired marker is ignored.
fn pair_intervals(markers: &[usize]) -> Vec<usize> {
    markers.chunks_exact(2).map(|p| p[1] - p[0]).collect()
}

/// Detect the pulldown cadence from repeat-first-field markers.
///
/// Every other rff-flagged coded index is a cycle-boundary marker; the most
/// frequent paired interval (ties go to the smaller one) plus one is the
/// cycle length.
pub fn analyze(flags: &[FlagRecord]) -> Cadence {
    let markers: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, f)| f.repeat_first_field)
        .map(|(i, _)| i)
        .step_by(2)
        .collect();

    if markers.len() < 2 {
        debug!("No pulldown: {} cycle markers", markers.len());
        return Cadence::none();
    }

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for delta in pair_intervals(&markers) {
        *histogram.entry(delta).or_default() += 1;
    }
    trace!("Marker interval histogram: {:?}", histogram);

    // Ascending key order, so only a strictly larger count replaces the pick.
    let mut best = (0, 0);
    for (&delta, &count) in &histogram {
        if count > best.1 {
            best = (delta, count);
        }
    }

    let cadence = Cadence::from_cycle(best.0 + 1);
    debug!(
        "Detected cadence {} from {} markers",
        cadence,
        markers.len()
    );
    cadence
}

/// Strict cycle check over progressive frames.
///
/// Markers are progressive coded indices with neither `tff` nor `rff` set,
/// paired as in [`analyze`]. Returns `Ok(None)` when there is nothing to
/// verify, `Ok(Some(cycle))` when every interval agrees, and
/// [`PulldownError::Cadence`] otherwise.
pub fn linear_cycle(flags: &[FlagRecord]) -> Result<Option<usize>> {
    let markers: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, f)| f.progressive && !f.top_field_first && !f.repeat_first_field)
        .map(|(i, _)| i)
        .collect();

    let intervals = pair_intervals(&markers);
    let Some(&first) = intervals.first() else {
        return Ok(None);
    };
    if intervals.iter().any(|&d| d != first) {
        return Err(PulldownError::Cadence { intervals });
    }
    Ok(Some(first + 1))
}
