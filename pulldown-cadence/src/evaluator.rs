//! Adaptive per-frame deinterlacing.
//!
//! Two whole-sequence branches are built once: a cheap field matcher and an
//! expensive motion-adaptive deinterlacer. [`AdaptiveSequence`] then picks,
//! per output frame, the cheapest branch that is good enough:
//!
//! 1. progressive frames pass through untouched;
//! 2. when the standard or the requested rate rules out field matching, the
//!    deinterlacer's frame is used;
//! 3. otherwise the field matcher's frame is used, unless it reports the
//!    frame as still combed.
//!
//! Decisions depend only on the frame's flag record and field parity, are
//! cached per coded index, and never on previously produced output, so
//! frames can be pulled in any order or in parallel.

use crate::classifier::{DecisionPolicy, FrameClass};
use crate::error::{PulldownError, Result};
use crate::metadata::FlagRecord;
use crate::paired::PairedSequence;
use crate::standard::VideoStandard;
use parking_lot::RwLock;
use pulldown_core::sequence::{check_index, SequenceInfo};
use pulldown_core::{
    FieldOrder, Frame, FrameSequence, FrameTransform, Rational, SharedSequence, TransformConfig,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Frame property holding the final [`FrameClass`] of an output frame.
pub const CLASS_PROP: &str = "_PulldownClass";

/// Option names understood by field matchers.
pub mod matcher_options {
    /// Field order: 1 top first, 0 bottom first.
    pub const ORDER: &str = "order";
    /// Field to match from.
    pub const FIELD: &str = "field";
    /// Matching mode.
    pub const MODE: &str = "mode";
}

/// Option names understood by motion-adaptive deinterlacers.
pub mod deinterlacer_options {
    /// Output rate divisor: 2 single rate, 1 double rate.
    pub const FPS_DIVISOR: &str = "fps_divisor";
    /// Top field first.
    pub const TFF: &str = "tff";
    /// Main quality preset.
    pub const PRESET: &str = "preset";
    /// Match quality preset.
    pub const MATCH_PRESET: &str = "match_preset";
    /// Second match quality preset.
    pub const MATCH_PRESET2: &str = "match_preset2";
    /// Input type: 0 interlaced.
    pub const INPUT_TYPE: &str = "input_type";
    /// Source match mode.
    pub const SOURCE_MATCH: &str = "source_match";
    /// Lossless mode.
    pub const LOSSLESS: &str = "lossless";
    /// Sharpness.
    pub const SHARPNESS: &str = "sharpness";
    /// Shutter blur.
    pub const SHUTTER_BLUR: &str = "shutter_blur";
    /// Source shutter angle.
    pub const SHUTTER_ANGLE_SRC: &str = "shutter_angle_src";
    /// Output shutter angle.
    pub const SHUTTER_ANGLE_OUT: &str = "shutter_angle_out";
    /// Shutter blur limit.
    pub const SBLUR_LIMIT: &str = "sblur_limit";
}

/// Default field matcher options for `order`.
pub fn matcher_defaults(order: FieldOrder) -> TransformConfig {
    use matcher_options::*;
    TransformConfig::new()
        .with(ORDER, i64::from(order.is_tff()))
        .with(FIELD, 2)
        .with(MODE, 0)
}

/// Default deinterlacer options for `order`.
pub fn deinterlacer_defaults(order: FieldOrder) -> TransformConfig {
    use deinterlacer_options::*;
    TransformConfig::new()
        .with(FPS_DIVISOR, i64::from(DecisionPolicy::SINGLE_RATE_DIVISOR))
        .with(PRESET, "placebo")
        .with(MATCH_PRESET, "placebo")
        .with(MATCH_PRESET2, "placebo")
        .with(TFF, order.is_tff())
        .with(INPUT_TYPE, 0)
        .with(SOURCE_MATCH, 3)
        .with(LOSSLESS, 2)
        .with(SHARPNESS, 0.2)
        .with(SHUTTER_BLUR, 0)
        .with(SHUTTER_ANGLE_SRC, 0)
        .with(SHUTTER_ANGLE_OUT, 0)
        .with(SBLUR_LIMIT, 0)
}

/// Evaluator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    /// Field order; inferred from the first frame when `None`.
    pub field_order: Option<FieldOrder>,
    /// Requested rate divisor: 2 single rate, 1 double rate.
    pub fps_divisor: u32,
    /// Source standard; detected from rate and size when `None`.
    pub standard: Option<VideoStandard>,
    /// User options layered over the field matcher defaults.
    pub matcher: TransformConfig,
    /// User options layered over the deinterlacer defaults.
    pub deinterlacer: TransformConfig,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            field_order: None,
            fps_divisor: DecisionPolicy::SINGLE_RATE_DIVISOR,
            standard: None,
            matcher: TransformConfig::new(),
            deinterlacer: TransformConfig::new(),
        }
    }
}

impl EvaluatorConfig {
    /// Double-rate output.
    pub fn double_rate() -> Self {
        Self {
            fps_divisor: 1,
            ..Self::default()
        }
    }

    /// Whether double-rate output was requested.
    pub fn is_double_rate(&self) -> bool {
        self.fps_divisor == 1
    }
}

/// Builds [`AdaptiveSequence`]s.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveEvaluator {
    config: EvaluatorConfig,
}

impl AdaptiveEvaluator {
    /// Create an evaluator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator with explicit configuration.
    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Build both branches and the lazy output sequence.
    ///
    /// All validation happens here; no output frame is produced.
    pub fn deinterlace(
        &self,
        paired: &PairedSequence,
        matcher: &dyn FrameTransform,
        deinterlacer: &dyn FrameTransform,
    ) -> Result<Arc<AdaptiveSequence>> {
        let config = &self.config;
        if !matches!(config.fps_divisor, 1 | 2) {
            return Err(PulldownError::config(format!(
                "fps divisor must be 1 or 2, got {}",
                config.fps_divisor
            )));
        }

        let source = Arc::clone(paired.frames());
        let info = source.info();
        if info.frame_rate.is_zero() {
            return Err(PulldownError::format("source has no frame rate"));
        }

        let field_order = match config.field_order {
            Some(order) => order,
            None if paired.is_empty() => FieldOrder::TopFieldFirst,
            None => FieldOrder::from_frame(&source.frame(0)?),
        };
        let standard = config
            .standard
            .unwrap_or_else(|| VideoStandard::detect_strict(info.frame_rate, info.width, info.height));
        let policy = DecisionPolicy::new(standard, config.fps_divisor);

        let matcher_config = TransformConfig::layered(
            matcher_defaults(field_order),
            &config.matcher,
            &TransformConfig::new(),
        );
        let cheap = matcher.transform(Arc::clone(&source), &matcher_config)?;
        let cheap_info = cheap.info();
        if cheap_info.length != info.length {
            return Err(PulldownError::LengthMismatch {
                frames: cheap_info.length,
                flags: paired.len(),
            });
        }

        // At single rate the deinterlacer only has to clean up what the
        // matcher left behind; at double rate it needs every field.
        let expensive_input = if config.fps_divisor == DecisionPolicy::SINGLE_RATE_DIVISOR {
            Arc::clone(&cheap)
        } else {
            Arc::clone(&source)
        };
        let deinterlacer_config = TransformConfig::layered(
            deinterlacer_defaults(field_order),
            &config.deinterlacer,
            &TransformConfig::new().with(
                deinterlacer_options::FPS_DIVISOR,
                i64::from(config.fps_divisor),
            ),
        );
        let expensive = deinterlacer.transform(expensive_input, &deinterlacer_config)?;
        let expensive_info = expensive.info();

        let factor = expensive_info.frame_rate.ratio_to(info.frame_rate);
        let rate_factor = if factor == Rational::from_int(1) {
            1
        } else if factor == Rational::from_int(2) {
            2
        } else {
            return Err(PulldownError::UnsupportedRate { factor });
        };
        if rate_factor != 3 - config.fps_divisor as usize {
            warn!(
                "{} produced {}x rate but fps divisor {} was requested",
                deinterlacer.name(),
                rate_factor,
                config.fps_divisor
            );
        }
        if expensive_info.length != info.length * rate_factor {
            return Err(PulldownError::LengthMismatch {
                frames: expensive_info.length,
                flags: paired.len() * rate_factor,
            });
        }
        for (name, branch) in [(matcher.name(), cheap_info), (deinterlacer.name(), expensive_info)] {
            if branch.width != info.width || branch.height != info.height || branch.format != info.format {
                return Err(pulldown_core::Error::format_mismatch(format!(
                    "{name} produced {branch}, source is {info}"
                ))
                .into());
            }
        }

        debug!(
            "Adaptive deinterlace: {} via {} / {}, {} {}, {}x rate",
            info,
            matcher.name(),
            deinterlacer.name(),
            standard,
            if field_order.is_tff() { "TFF" } else { "BFF" },
            rate_factor
        );

        Ok(Arc::new(AdaptiveSequence {
            matcher: matcher.name().to_string(),
            source,
            cheap,
            expensive,
            flags: paired.shared_flags(),
            policy,
            rate_factor,
            info: expensive_info,
            classes: RwLock::new(vec![None; paired.len()]),
        }))
    }
}

/// Lazy output of the adaptive evaluator.
pub struct AdaptiveSequence {
    matcher: String,
    source: SharedSequence,
    cheap: SharedSequence,
    expensive: SharedSequence,
    flags: Arc<[FlagRecord]>,
    policy: DecisionPolicy,
    rate_factor: usize,
    info: SequenceInfo,
    /// Policy decision per coded index, before the matcher's combed check.
    classes: RwLock<Vec<Option<FrameClass>>>,
}

impl AdaptiveSequence {
    /// Output frames per coded frame: 1 or 2.
    pub fn rate_factor(&self) -> usize {
        self.rate_factor
    }

    /// The decision policy in use.
    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Coded index output `index` is derived from.
    pub fn coded_index(&self, index: usize) -> usize {
        index / self.rate_factor
    }

    /// Flag record consulted for output `index`.
    pub fn flag_for(&self, index: usize) -> Option<&FlagRecord> {
        self.flags.get(self.coded_index(index))
    }

    /// Policy decision for coded index `coded`, computed once.
    fn class_at(&self, coded: usize) -> pulldown_core::Result<FrameClass> {
        if let Some(class) = self.classes.read()[coded] {
            return Ok(class);
        }
        let field_based = self.source.frame(coded)?.props.field_based;
        let class = self.policy.classify(&self.flags[coded], field_based);
        self.classes.write()[coded] = Some(class);
        Ok(class)
    }

    /// Decision for output `index` before the matcher's combed check.
    pub fn planned_class(&self, index: usize) -> pulldown_core::Result<FrameClass> {
        check_index(index, self.info.length)?;
        self.class_at(self.coded_index(index))
    }
}

impl std::fmt::Debug for AdaptiveSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveSequence")
            .field("info", &self.info)
            .field("matcher", &self.matcher)
            .field("policy", &self.policy)
            .field("rate_factor", &self.rate_factor)
            .finish()
    }
}

impl FrameSequence for AdaptiveSequence {
    fn info(&self) -> SequenceInfo {
        self.info
    }

    fn frame(&self, index: usize) -> pulldown_core::Result<Frame> {
        check_index(index, self.info.length)?;
        let coded = self.coded_index(index);
        let planned = self.class_at(coded)?;

        let (class, mut frame) = match planned {
            FrameClass::Progressive => (planned, self.source.frame(coded)?),
            FrameClass::NeedsFullDeinterlace => (planned, self.expensive.frame(index)?),
            FrameClass::NeedsFieldMatch => {
                let matched = self.cheap.frame(coded)?;
                let combed = matched.props.combed.ok_or_else(|| {
                    pulldown_core::Error::transform(
                        self.matcher.as_str(),
                        format!("frame {coded} carries no combed signal"),
                    )
                })?;
                let class = self.policy.after_match(planned, combed);
                match class {
                    FrameClass::NeedsFullDeinterlace => (class, self.expensive.frame(index)?),
                    _ => (class, matched),
                }
            }
        };
        trace!("adaptive frame {} (coded {}): {}", index, coded, class);

        self.flags[coded].stamp(&mut frame.props);
        frame.props.set(CLASS_PROP, class.as_str());
        Ok(frame)
    }
}
