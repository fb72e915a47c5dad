//! Source facade tying flags, cadence, conversion and deinterlacing together.

use crate::analyzer::{analyze, Cadence};
use crate::converter::{CadenceConverter, CadenceStream, FloorOptions};
use crate::d2v::D2vProject;
use crate::error::Result;
use crate::evaluator::{AdaptiveEvaluator, AdaptiveSequence, EvaluatorConfig};
use crate::metadata::{extract_flags, section_ranges, FlagRecord, IndexData, SectionId};
use crate::paired::PairedSequence;
use crate::standard::{pixel_aspect_ratio, storage_aspect_ratio, AspectRatio, VideoStandard};
use pulldown_core::{FrameTransform, SharedSequence};
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::info;

/// Statistics about a source's coding flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    /// Coded pictures.
    pub coded_frames: usize,
    /// Progressively coded pictures.
    pub progressive_frames: usize,
    /// Progressive share in percent.
    pub progressive_percent: f64,
    /// Progressive pictures asking for an extra display.
    pub pulldown_frames: usize,
    /// Detected cadence.
    pub cadence: Cadence,
    /// Whether the display rate varies.
    pub vfr: bool,
    /// Standard detected from the frame rate.
    pub standard: VideoStandard,
    /// Storage aspect ratio.
    pub storage_aspect: AspectRatio,
    /// Display aspect ratio, when the index carries one.
    pub display_aspect: Option<AspectRatio>,
    /// Pixel aspect ratio, when the display aspect is known.
    pub pixel_aspect: Option<AspectRatio>,
}

impl SourceSummary {
    /// Frames shown once every pulldown flag is honoured.
    pub fn frames_after_pulldown(&self) -> usize {
        self.coded_frames + self.pulldown_frames
    }
}

impl fmt::Display for SourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progressive: {:05.2}% ({})",
            self.progressive_percent, self.progressive_frames
        )?;
        if self.cadence.is_detected() {
            write!(f, " w/ Pulldown {}", self.cadence)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Interlaced:  {:05.2}% ({})",
            100.0 - self.progressive_percent,
            self.coded_frames - self.progressive_frames
        )?;
        write!(f, "VFR? {}  SAR: {}", self.vfr, self.storage_aspect)?;
        if let (Some(dar), Some(par)) = (self.display_aspect, self.pixel_aspect) {
            write!(f, "  DAR: {dar}  PAR: {par}")?;
        }
        writeln!(f)?;
        write!(
            f,
            "{}, {} coded pictures, {} after pulldown",
            self.standard,
            self.coded_frames,
            self.frames_after_pulldown()
        )
    }
}

/// A decoded source with its coding flags.
///
/// Conversions consume the source and return the converted one.
#[derive(Debug, Clone)]
pub struct PulldownSource {
    stream: CadenceStream,
    cadence: Cadence,
    display_aspect: Option<AspectRatio>,
}

impl PulldownSource {
    /// Pair decoded frames (flags ignored, one frame per coded picture) with
    /// their flag records.
    pub fn new(frames: SharedSequence, flags: Vec<FlagRecord>) -> Result<Self> {
        let paired = PairedSequence::new(frames, flags)?;
        let cadence = analyze(paired.flags());
        let stream = CadenceStream::detect(paired);
        Ok(Self {
            stream,
            cadence,
            display_aspect: None,
        })
    }

    /// Build from a parsed section/flags index.
    pub fn from_index(frames: SharedSequence, index: &IndexData) -> Result<Self> {
        Self::new(frames, extract_flags(Some(index))?)
    }

    /// Build from a DGIndex project, also taking its display aspect ratio.
    pub fn from_d2v(frames: SharedSequence, project: &D2vProject) -> Result<Self> {
        let mut source = Self::from_index(frames, &project.to_index())?;
        source.display_aspect = project.aspect_ratio().and_then(AspectRatio::parse);
        Ok(source)
    }

    /// Current flag records.
    pub fn flags(&self) -> &[FlagRecord] {
        self.stream.flags()
    }

    /// Current frames, each stamped with its flag record.
    pub fn frames(&self) -> SharedSequence {
        self.stream.paired().stamped()
    }

    /// Paired frames and flags.
    pub fn paired(&self) -> &PairedSequence {
        self.stream.paired()
    }

    /// Cadence detected when the source was opened.
    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    /// Whether the display rate still varies.
    pub fn is_vfr(&self) -> bool {
        self.stream.is_vfr()
    }

    /// Standard detected from the current frame rate.
    pub fn standard(&self) -> VideoStandard {
        VideoStandard::detect(self.stream.paired().info().frame_rate)
    }

    /// Coded index range of each source section.
    pub fn sections(&self) -> Vec<(SectionId, RangeInclusive<usize>)> {
        section_ranges(self.flags())
    }

    /// Duplicate-based VFR to CFR conversion.
    pub fn ceil(self) -> Result<Self> {
        let stream = CadenceConverter::new(self.cadence.clone()).ceil(&self.stream)?;
        Ok(Self { stream, ..self })
    }

    /// Decimation-based VFR to CFR conversion.
    pub fn floor(self, options: FloorOptions) -> Result<Self> {
        let stream =
            CadenceConverter::with_config(self.cadence.clone(), options).floor(&self.stream)?;
        Ok(Self { stream, ..self })
    }

    /// Adaptive deinterlacing of the current frames.
    pub fn deinterlace(
        &self,
        matcher: &dyn FrameTransform,
        deinterlacer: &dyn FrameTransform,
        config: EvaluatorConfig,
    ) -> Result<Arc<AdaptiveSequence>> {
        AdaptiveEvaluator::with_config(config).deinterlace(self.stream.paired(), matcher, deinterlacer)
    }

    /// Flag statistics of the current state.
    pub fn summary(&self) -> SourceSummary {
        let flags = self.flags();
        let info = self.stream.paired().info();
        let progressive_frames = flags.iter().filter(|f| f.progressive).count();
        let progressive_percent = if flags.is_empty() {
            0.0
        } else {
            progressive_frames as f64 / flags.len() as f64 * 100.0
        };
        SourceSummary {
            coded_frames: flags.len(),
            progressive_frames,
            progressive_percent,
            pulldown_frames: flags.iter().filter(|f| f.is_progressive_pulldown()).count(),
            cadence: self.cadence.clone(),
            vfr: self.is_vfr(),
            standard: self.standard(),
            storage_aspect: storage_aspect_ratio(info.width, info.height),
            display_aspect: self.display_aspect,
            pixel_aspect: self
                .display_aspect
                .map(|dar| pixel_aspect_ratio(info.width, info.height, dar)),
        }
    }

    /// Log the summary at info level.
    pub fn log_summary(&self) {
        let summary = self.summary();
        info!(
            coded = summary.coded_frames,
            progressive = summary.progressive_frames,
            vfr = summary.vfr,
            "Source: {}, cadence {}, {:.2}% progressive",
            summary.standard,
            summary.cadence,
            summary.progressive_percent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::d2v;
    use pulldown_core::{Frame, PixelFormat, Rational, VecSequence};

    fn frames(count: usize) -> SharedSequence {
        let frames = (0..count)
            .map(|_| Frame::new(720, 480, PixelFormat::Yuv420p))
            .collect();
        VecSequence::new(frames, Rational::NTSC).unwrap().shared()
    }

    const PROJECT: &str = "DGIndexProjectFile16
1
/media/VTS_01_1.VOB

Aspect_Ratio=16:9
Picture_Size=720x480
Frame_Rate=29970 (30000/1001)

900 5 0 2048 0 1 1 d3 70 71 72 d3 70 71 72
900 5 0 30720 0 1 2 92 b2 a2 b2 92 b2 ff

FINISHED  100.00% FILM
";

    #[test]
    fn test_from_d2v_summary() {
        let project = d2v::parse(PROJECT).unwrap();
        let source = PulldownSource::from_d2v(frames(14), &project).unwrap();
        assert!(source.is_vfr());
        assert_eq!(source.cadence().cycle_length, 5);
        assert_eq!(source.sections().len(), 2);

        let summary = source.summary();
        assert_eq!(summary.coded_frames, 14);
        assert_eq!(summary.progressive_frames, 8);
        assert_eq!(summary.pulldown_frames, 2);
        assert_eq!(summary.frames_after_pulldown(), 16);
        assert_eq!(summary.standard, VideoStandard::Ntsc);
        assert_eq!(summary.storage_aspect.to_string(), "3:2");
        assert_eq!(summary.pixel_aspect.map(|p| p.to_string()).as_deref(), Some("32:27"));

        let text = summary.to_string();
        assert!(text.starts_with("Progressive: 57.14% (8) w/ Pulldown 2:3 (cycle 5)"));
        assert!(text.contains("DAR: 16:9"));
    }

    #[test]
    fn test_chained_conversions() {
        let project = d2v::parse(PROJECT).unwrap();
        let source = PulldownSource::from_d2v(frames(14), &project).unwrap();

        let ceiled = source.clone().ceil().unwrap();
        assert!(!ceiled.is_vfr());
        assert_eq!(ceiled.flags().len(), 16);
        assert_eq!(ceiled.frames().len(), 16);

        let floored = source.floor(FloorOptions::default()).unwrap();
        assert!(!floored.is_vfr());
        // 8 progressive kept, 6 interlaced -> 5 kept.
        assert_eq!(floored.flags().len(), 13);
        assert_eq!(floored.standard(), VideoStandard::Other(Rational::NTSC_FILM));
    }

    #[test]
    fn test_frames_are_stamped() {
        let flags = vec![FlagRecord::new(true, false, true).in_section(SectionId::new(3, 4)); 2];
        let source = PulldownSource::new(frames(2), flags).unwrap();
        let frame = source.frames().frame(1).unwrap();
        assert_eq!(
            FlagRecord::from_props(&frame.props).map(|f| f.section_id),
            Some(SectionId::new(3, 4))
        );
    }
}
