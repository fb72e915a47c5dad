//! End-to-end pulldown tests.
//!
//! Drives index parsing, cadence detection, conversion and adaptive
//! deinterlacing with mock frame sources and transforms.

use pulldown_cadence::{
    extract_flags, EvaluatorConfig, FlagRecord, FloorOptions, FrameClass, IndexData,
    PulldownError, PulldownSource, SectionId,
};
use pulldown_core::sequence::{IndexMapped, SequenceInfo};
use pulldown_core::{
    FieldBased, Frame, FrameSequence, FrameTransform, PixelFormat, Rational, SharedSequence,
    TransformConfig, VecSequence,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// Mock Implementations
// =============================================================================

/// Decoded source: frame `i` is filled with `i % 256`, field parity from the
/// flag record.
fn decoded(flags: &[FlagRecord]) -> SharedSequence {
    let frames = flags
        .iter()
        .enumerate()
        .map(|(i, flag)| {
            let mut frame = Frame::new(64, 48, PixelFormat::Yuv420p);
            frame.buffer_mut().fill(i as u8);
            frame.props.field_based = match (flag.progressive, flag.top_field_first) {
                (true, _) => FieldBased::Progressive,
                (false, true) => FieldBased::TopFieldFirst,
                (false, false) => FieldBased::BottomFieldFirst,
            };
            frame
        })
        .collect();
    VecSequence::new(frames, Rational::NTSC).unwrap().shared()
}

fn luma(frame: &Frame) -> u8 {
    frame.plane(0).unwrap()[0]
}

/// Wraps a sequence, counting pulls and tagging frames.
struct Tagged {
    source: SharedSequence,
    tag: u8,
    combed_every: Option<usize>,
    pulls: Arc<AtomicUsize>,
}

impl FrameSequence for Tagged {
    fn info(&self) -> SequenceInfo {
        self.source.info()
    }

    fn frame(&self, index: usize) -> pulldown_core::Result<Frame> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let mut frame = self.source.frame(index)?;
        frame.props.combed = Some(self.combed_every.is_some_and(|k| index % k == 0));
        frame.buffer_mut().fill(self.tag);
        Ok(frame)
    }
}

/// Mock field matcher: tags frames with 0xAA, reports every `k`-th as combed.
struct MockMatcher {
    combed_every: Option<usize>,
    pulls: Arc<AtomicUsize>,
}

impl MockMatcher {
    fn new(combed_every: Option<usize>) -> Self {
        Self {
            combed_every,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameTransform for MockMatcher {
    fn name(&self) -> &str {
        "mock-matcher"
    }

    fn transform(
        &self,
        input: SharedSequence,
        _config: &TransformConfig,
    ) -> pulldown_core::Result<SharedSequence> {
        Ok(Arc::new(Tagged {
            source: input,
            tag: 0xAA,
            combed_every: self.combed_every,
            pulls: Arc::clone(&self.pulls),
        }))
    }
}

/// Mock deinterlacer: tags frames with 0xDD, doubles the rate when asked.
struct MockDeinterlacer {
    pulls: Arc<AtomicUsize>,
}

impl MockDeinterlacer {
    fn new() -> Self {
        Self {
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameTransform for MockDeinterlacer {
    fn name(&self) -> &str {
        "mock-deinterlacer"
    }

    fn transform(
        &self,
        input: SharedSequence,
        config: &TransformConfig,
    ) -> pulldown_core::Result<SharedSequence> {
        let info = input.info();
        let double = config.get_i64("fps_divisor") == Some(1);
        let factor = if double { 2 } else { 1 };
        let indices: Vec<usize> = (0..info.length * factor).map(|i| i / factor).collect();
        let rate = info.frame_rate.mul_int(factor as i64);
        let mapped: SharedSequence = Arc::new(IndexMapped::new(input, indices, Some(rate))?);
        Ok(Arc::new(Tagged {
            source: mapped,
            tag: 0xDD,
            combed_every: None,
            pulls: Arc::clone(&self.pulls),
        }))
    }
}

/// 40 soft-telecined pictures, 25 interlaced pictures, 20 more telecined.
fn mixed_flags() -> Vec<FlagRecord> {
    const CYCLE: [(bool, bool); 4] = [(true, true), (false, false), (false, true), (true, false)];
    let telecine = |i: usize| {
        let (tff, rff) = CYCLE[i % 4];
        FlagRecord::new(true, rff, tff).in_section(SectionId::new(1, 1))
    };
    let mut flags: Vec<FlagRecord> = (0..40).map(telecine).collect();
    flags.extend(
        (0..25).map(|_| FlagRecord::new(false, false, true).in_section(SectionId::new(1, 2))),
    );
    flags.extend((0..20).map(telecine).map(|f| f.in_section(SectionId::new(2, 1))));
    flags
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_json_index_to_source() {
    let json = r#"{"sections": [
        {"vob": 1, "cell": 1, "flags": [
            {"progressive_frame": true, "rff": true, "tff": true},
            {"progressive_frame": true, "rff": false, "tff": false},
            {"progressive_frame": true, "rff": true, "tff": false},
            {"progressive_frame": true, "rff": false, "tff": true}
        ]},
        {"vob": 1, "cell": 2, "flags": [
            {"progressive_frame": false, "rff": false, "tff": true},
            {"progressive_frame": false, "rff": false, "tff": true}
        ]}
    ]}"#;
    let index = IndexData::from_json(json).unwrap();
    let flags = extract_flags(Some(&index)).unwrap();
    let source = PulldownSource::from_index(decoded(&flags), &index).unwrap();

    assert!(source.is_vfr());
    assert_eq!(source.sections().len(), 2);
    // Only the first picture is progressive, rff and tff.
    assert_eq!(source.summary().pulldown_frames, 1);
}

#[test]
fn test_detects_cadence_and_vfr() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap();

    assert_eq!(source.cadence().cycle_length, 5);
    assert_eq!(source.cadence().pattern_string(), "2:3");
    assert!(source.is_vfr());

    let sections = source.sections();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[1], (SectionId::new(1, 2), 40..=64));
}

#[test]
fn test_ceil_then_deinterlace() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap().ceil().unwrap();
    // One picture in every four of the 60 telecined ones is rff and tff.
    assert_eq!(source.flags().len(), 85 + 15);
    assert!(!source.is_vfr());

    let matcher = MockMatcher::new(Some(3));
    let deinterlacer = MockDeinterlacer::new();
    let output = source
        .deinterlace(&matcher, &deinterlacer, EvaluatorConfig::default())
        .unwrap();
    assert_eq!(output.len(), 100);
    assert_eq!(output.info().frame_rate, Rational::NTSC);

    let paired = source.paired();
    for n in 0..output.len() {
        let frame = output.frame(n).unwrap();
        let flag = paired.flags()[n];
        if flag.progressive {
            assert!(frame.same_content(&paired.frames().frame(n).unwrap()));
        } else if n % 3 == 0 {
            assert_eq!(luma(&frame), 0xDD, "combed frame {n} should be deinterlaced");
        } else {
            assert_eq!(luma(&frame), 0xAA, "clean frame {n} should be field matched");
        }
        assert_eq!(FlagRecord::from_props(&frame.props), Some(flag));
    }
}

#[test]
fn test_progressive_frames_skip_both_branches() {
    let flags: Vec<FlagRecord> = (0..12).map(|_| FlagRecord::new(true, false, true)).collect();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap();

    let matcher = MockMatcher::new(None);
    let deinterlacer = MockDeinterlacer::new();
    let output = source
        .deinterlace(&matcher, &deinterlacer, EvaluatorConfig::default())
        .unwrap();

    for n in (0..12).rev() {
        assert_eq!(luma(&output.frame(n).unwrap()), n as u8);
    }
    assert_eq!(matcher.pulls.load(Ordering::SeqCst), 0);
    assert_eq!(deinterlacer.pulls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_floor_then_double_rate() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags)
        .unwrap()
        .floor(FloorOptions::default())
        .unwrap();
    // 60 progressive kept, 25 interlaced -> 20 kept.
    assert_eq!(source.flags().len(), 80);
    assert_eq!(source.paired().info().frame_rate, Rational::NTSC_FILM);

    let matcher = MockMatcher::new(None);
    let deinterlacer = MockDeinterlacer::new();
    let output = source
        .deinterlace(&matcher, &deinterlacer, EvaluatorConfig::double_rate())
        .unwrap();

    assert_eq!(output.len(), 160);
    assert_eq!(output.info().frame_rate, Rational::new(48000, 1001));
    for n in 0..output.len() {
        let flag = output.flag_for(n).copied().unwrap();
        assert_eq!(flag, source.flags()[n / 2]);
        let frame = output.frame(n).unwrap();
        if flag.progressive {
            assert!(frame.same_content(&source.paired().frames().frame(n / 2).unwrap()));
        } else {
            assert_eq!(luma(&frame), 0xDD);
        }
    }
    assert_eq!(matcher.pulls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_floor_per_section() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags)
        .unwrap()
        .floor(FloorOptions::default().per_section())
        .unwrap();

    // Each cell is uniform, so each is decimated 4 of 5 from its own start:
    // 40 -> 32, 25 -> 20, 20 -> 16.
    assert_eq!(source.flags().len(), 68);
    assert_eq!(source.paired().info().frame_rate, Rational::NTSC_FILM);
    let sections = source.sections();
    assert_eq!(sections[1], (SectionId::new(1, 2), 32..=51));
    assert_eq!(sections[2], (SectionId::new(2, 1), 52..=67));
    // The interlaced cell restarts its cycle at coded picture 40.
    assert_eq!(luma(&source.frames().frame(32).unwrap()), 40);
    assert_eq!(luma(&source.frames().frame(36).unwrap()), 45);
}

#[test]
fn test_out_of_order_pulls_are_stable() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap();
    let matcher = MockMatcher::new(Some(2));
    let deinterlacer = MockDeinterlacer::new();
    let output = source
        .deinterlace(&matcher, &deinterlacer, EvaluatorConfig::default())
        .unwrap();

    let forward: Vec<u8> = (0..output.len()).map(|n| luma(&output.frame(n).unwrap())).collect();
    let backward: Vec<u8> = (0..output.len())
        .rev()
        .map(|n| luma(&output.frame(n).unwrap()))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    assert_eq!(forward, backward);

    let planned = output.planned_class(45).unwrap();
    assert_eq!(planned, FrameClass::NeedsFieldMatch);
}

#[test]
fn test_parallel_pulls() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap();
    let output: SharedSequence = source
        .deinterlace(
            &MockMatcher::new(Some(4)),
            &MockDeinterlacer::new(),
            EvaluatorConfig::default(),
        )
        .unwrap();

    let expected: Vec<u8> = (0..output.len()).map(|n| luma(&output.frame(n).unwrap())).collect();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let output = Arc::clone(&output);
            std::thread::spawn(move || {
                (0..output.len())
                    .filter(|n| n % 4 == t)
                    .map(|n| (n, luma(&output.frame(n).unwrap())))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        for (n, value) in handle.join().unwrap() {
            assert_eq!(value, expected[n]);
        }
    }
}

#[test]
fn test_errors_surface_at_setup() {
    let flags = mixed_flags();
    let source = PulldownSource::new(decoded(&flags), flags).unwrap();

    let err = source
        .clone()
        .floor(FloorOptions::default().with_cycle(5).with_offsets(vec![]))
        .unwrap_err();
    assert!(matches!(err, PulldownError::Config(_)));
    assert!(err.is_recoverable());

    assert!(matches!(
        PulldownSource::new(decoded(&mixed_flags()), vec![FlagRecord::default(); 3]),
        Err(PulldownError::LengthMismatch { .. })
    ));
}
