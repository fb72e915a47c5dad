//! Variable to constant frame rate conversion.
//!
//! Soft-telecined content mixes progressive pictures that ask for an extra
//! field display with genuinely interlaced pictures. Played back with the
//! flags ignored, the progressive parts run too fast. Two ways out:
//!
//! - [`CadenceConverter::ceil`] duplicates every progressive picture whose
//!   pulldown asks for an extra display, raising the film parts to the video
//!   rate.
//! - [`CadenceConverter::floor`] decimates the interlaced parts down to the
//!   film rate and re-times the progressive parts to match.

use crate::analyzer::{linear_cycle, Cadence};
use crate::error::{PulldownError, Result};
use crate::metadata::{is_vfr, section_ranges, FlagRecord};
use crate::paired::PairedSequence;
use pulldown_core::sequence::select_every_indices;
use pulldown_core::Rational;
use tracing::{debug, warn};

/// Paired frames and flags together with their VFR state.
#[derive(Debug, Clone)]
pub struct CadenceStream {
    paired: PairedSequence,
    vfr: bool,
}

impl CadenceStream {
    /// Wrap a paired sequence with a known VFR state.
    pub fn new(paired: PairedSequence, vfr: bool) -> Self {
        Self { paired, vfr }
    }

    /// Wrap a paired sequence, detecting VFR from its flags.
    pub fn detect(paired: PairedSequence) -> Self {
        let vfr = is_vfr(paired.flags());
        Self { paired, vfr }
    }

    /// The paired frames and flags.
    pub fn paired(&self) -> &PairedSequence {
        &self.paired
    }

    /// The flag records.
    pub fn flags(&self) -> &[FlagRecord] {
        self.paired.flags()
    }

    /// Whether the stream still has a variable display rate.
    pub fn is_vfr(&self) -> bool {
        self.vfr
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.paired.len()
    }

    /// Whether the stream has no frames.
    pub fn is_empty(&self) -> bool {
        self.paired.is_empty()
    }

    /// Unwrap the paired sequence.
    pub fn into_paired(self) -> PairedSequence {
        self.paired
    }
}

/// Decimation settings for one source section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFloor {
    /// Decimation period for this section.
    pub cycle: usize,
    /// Positions kept in each period; defaults to all but the last.
    pub offsets: Option<Vec<usize>>,
}

impl SectionFloor {
    /// Settings with a cycle and the default offsets.
    pub fn new(cycle: usize) -> Self {
        Self {
            cycle,
            offsets: None,
        }
    }

    /// Set explicit offsets.
    pub fn with_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.offsets = Some(offsets);
        self
    }
}

/// Options for decimation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloorOptions {
    /// Decimation period; defaults to the detected cycle.
    pub cycle: Option<usize>,
    /// Positions kept in each period, in output order; defaults to all but
    /// the last. Listing them out of order reorders frames inside each
    /// period.
    pub offsets: Option<Vec<usize>>,
    /// Restart the cycle at every source section and decimate each section
    /// on its own.
    pub per_section: bool,
    /// Settings for the first sections, in coded order. Sections past the
    /// end of the list use `cycle` and `offsets`.
    pub sections: Vec<SectionFloor>,
}

impl FloorOptions {
    /// Set an explicit cycle.
    pub fn with_cycle(mut self, cycle: usize) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Set explicit offsets.
    pub fn with_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// Decimate every section separately.
    pub fn per_section(mut self) -> Self {
        self.per_section = true;
        self
    }

    /// Add settings for the next section; implies [`per_section`](Self::per_section).
    pub fn with_section(mut self, section: SectionFloor) -> Self {
        self.per_section = true;
        self.sections.push(section);
        self
    }
}

/// Resolved, validated decimation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorPlan {
    /// Decimation period.
    pub cycle: usize,
    /// Kept positions, in output order.
    pub offsets: Vec<usize>,
    /// Whether the cycle came from the detected cadence.
    pub defaulted: bool,
}

impl FloorPlan {
    /// Rate of the decimated output for an input at `rate`.
    ///
    /// CFR input keeps `offsets` of every cycle. VFR input is brought to the
    /// film rate, one frame per cycle removed.
    pub fn output_rate(&self, rate: Rational, vfr: bool) -> Rational {
        let cycle = self.cycle as i64;
        if vfr {
            rate.scale(cycle - 1, cycle)
        } else {
            rate.scale(self.offsets.len() as i64, cycle)
        }
    }
}

/// Validate a cycle and offsets for a stream of `length` frames.
fn resolve_plan(
    cycle: usize,
    offsets: Option<&[usize]>,
    defaulted: bool,
    length: usize,
) -> Result<Option<FloorPlan>> {
    if cycle == 0 {
        return Ok(None);
    }
    if cycle > length {
        return Err(PulldownError::config(format!(
            "cycle {cycle} is longer than the {length}-frame stream"
        )));
    }

    let offsets = match offsets {
        Some(offsets) => offsets.to_vec(),
        None => (0..cycle - 1).collect(),
    };
    if offsets.is_empty() || offsets.len() >= cycle {
        return Err(PulldownError::config(format!(
            "offsets {offsets:?} must have between 1 and {} entries for cycle {cycle}",
            cycle - 1
        )));
    }
    if let Some(bad) = offsets.iter().find(|&&o| o >= cycle) {
        return Err(PulldownError::config(format!(
            "offset {bad} is outside cycle {cycle}"
        )));
    }
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != offsets.len() {
        return Err(PulldownError::config(format!(
            "offsets {offsets:?} contain duplicates"
        )));
    }

    Ok(Some(FloorPlan {
        cycle,
        offsets,
        defaulted,
    }))
}

/// Converts a [`CadenceStream`] from variable to constant frame rate.
#[derive(Debug, Clone, Default)]
pub struct CadenceConverter {
    cadence: Cadence,
    config: FloorOptions,
}

impl CadenceConverter {
    /// Create a converter for a detected cadence with default options.
    pub fn new(cadence: Cadence) -> Self {
        Self::with_config(cadence, FloorOptions::default())
    }

    /// Create a converter with explicit decimation options.
    pub fn with_config(cadence: Cadence, config: FloorOptions) -> Self {
        Self { cadence, config }
    }

    /// The cadence defaults are taken from.
    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    /// The decimation options.
    pub fn config(&self) -> &FloorOptions {
        &self.config
    }

    /// Resolve and validate the decimation plan for a stream of `length`
    /// frames.
    ///
    /// Returns `None` when there is no cycle to decimate by.
    pub fn plan(&self, length: usize) -> Result<Option<FloorPlan>> {
        match self.config.cycle {
            Some(cycle) if cycle > 0 => {
                resolve_plan(cycle, self.config.offsets.as_deref(), false, length)
            }
            _ => resolve_plan(
                self.cadence.cycle_length,
                self.config.offsets.as_deref(),
                true,
                length,
            ),
        }
    }

    /// Resolve and validate the plan of section `section` in a stream of
    /// `length` frames.
    pub fn section_plan(&self, section: usize, length: usize) -> Result<Option<FloorPlan>> {
        match self.config.sections.get(section) {
            Some(settings) => {
                resolve_plan(settings.cycle, settings.offsets.as_deref(), false, length)
            }
            None => self.plan(length),
        }
    }

    /// Duplicate-based conversion.
    ///
    /// Every progressive, rff, tff picture is shown twice; the inserted copy's
    /// flag record has rff cleared. CFR input is returned unchanged.
    pub fn ceil(&self, stream: &CadenceStream) -> Result<CadenceStream> {
        if !stream.vfr {
            debug!("ceil: stream is already CFR");
            return Ok(stream.clone());
        }

        let pulldown: Vec<usize> = stream
            .flags()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_progressive_pulldown())
            .map(|(i, _)| i)
            .collect();
        if pulldown.is_empty() {
            debug!("ceil: no progressive pulldown pictures, nothing to duplicate");
            return Ok(CadenceStream::new(stream.paired.clone(), false));
        }

        let paired = stream.paired.duplicate(&pulldown, |f| f.without_rff())?;
        debug!(
            "ceil: duplicated {} pictures, {} -> {} frames",
            pulldown.len(),
            stream.len(),
            paired.len()
        );
        Ok(CadenceStream::new(paired, false))
    }

    /// Decimation-based conversion.
    ///
    /// CFR input is decimated uniformly. VFR input is split into progressive
    /// and interlaced runs: progressive runs are re-timed to the film rate,
    /// interlaced runs are decimated, and the runs are joined back in coded
    /// order. Options are validated before any frame is touched.
    pub fn floor(&self, stream: &CadenceStream) -> Result<CadenceStream> {
        if self.config.per_section {
            return self.floor_sections(stream);
        }
        match self.plan(stream.len())? {
            Some(plan) => Self::floor_with(stream, &plan),
            None => {
                debug!("floor: no cycle, nothing to decimate");
                Ok(stream.clone())
            }
        }
    }

    /// Decimate each source section on its own, restarting the cycle at
    /// every section boundary, and join the results.
    ///
    /// Every section has to come out at the same rate.
    fn floor_sections(&self, stream: &CadenceStream) -> Result<CadenceStream> {
        let rate = stream.paired.info().frame_rate;
        let sections = section_ranges(stream.flags());

        let mut planned = Vec::with_capacity(sections.len());
        let mut target: Option<Rational> = None;
        for (i, (id, range)) in sections.iter().enumerate() {
            let plan = self.section_plan(i, stream.len())?;
            let section =
                CadenceStream::detect(stream.paired.trim(*range.start()..*range.end() + 1)?);
            let section_rate = plan
                .as_ref()
                .map_or(rate, |p| p.output_rate(rate, section.vfr));
            match target {
                Some(target) if target != section_rate => {
                    return Err(PulldownError::config(format!(
                        "section {id} decimates to {section_rate} fps but earlier sections to {target} fps"
                    )));
                }
                _ => target = Some(section_rate),
            }
            planned.push((section, plan));
        }
        if planned.iter().all(|(_, plan)| plan.is_none()) {
            debug!("floor: no section has a cycle, nothing to decimate");
            return Ok(stream.clone());
        }

        let mut parts = Vec::with_capacity(planned.len());
        for (section, plan) in &planned {
            let part = match plan {
                Some(plan) => Self::floor_with(section, plan)?,
                None => section.clone(),
            };
            parts.push(part.into_paired());
        }
        let paired = PairedSequence::splice(parts)?;
        debug!(
            "floor: {} sections decimated separately, {} -> {} frames",
            planned.len(),
            stream.len(),
            paired.len()
        );
        Ok(CadenceStream::new(paired, false))
    }

    fn floor_with(stream: &CadenceStream, plan: &FloorPlan) -> Result<CadenceStream> {
        let FloorPlan {
            cycle,
            ref offsets,
            defaulted,
        } = *plan;
        let info = stream.paired.info();

        if !stream.vfr {
            let keep = select_every_indices(stream.len(), cycle, offsets);
            let rate = plan.output_rate(info.frame_rate, false);
            let paired = stream.paired.select(keep, Some(rate))?;
            debug!(
                "floor: CFR select every {} {:?}, {} -> {} frames @ {}",
                cycle,
                offsets,
                stream.len(),
                paired.len(),
                rate
            );
            return Ok(CadenceStream::new(paired, false));
        }

        if defaulted {
            match linear_cycle(stream.flags())? {
                Some(linear) if linear != cycle => warn!(
                    "floor: progressive sections repeat every {} frames but the detected cycle is {}",
                    linear, cycle
                ),
                _ => {}
            }
        }

        let runs = stream.paired.runs();
        if runs.is_empty() {
            return Ok(CadenceStream::new(stream.paired.clone(), false));
        }

        let target = plan.output_rate(info.frame_rate, true);
        let mut parts = Vec::with_capacity(runs.len());
        let mut dropped = 0;
        // Runs come out of partitioning in coded order; splicing them in that
        // order keeps the original timeline.
        for run in &runs {
            let section = stream.paired.trim(run.range.clone())?;
            let part = if run.progressive {
                section.retime(target)?
            } else {
                let keep = select_every_indices(section.len(), cycle, offsets);
                dropped += section.len() - keep.len();
                section.select(keep, Some(target))?
            };
            parts.push(part);
        }

        let paired = PairedSequence::splice(parts)?;
        debug!(
            "floor: {} runs, dropped {} interlaced frames, {} -> {} frames @ {}",
            runs.len(),
            dropped,
            stream.len(),
            paired.len(),
            target
        );
        Ok(CadenceStream::new(paired, false))
    }
}
