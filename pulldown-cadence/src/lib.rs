//! # Pulldown Cadence
//!
//! Flag-driven pulldown handling for soft-telecined MPEG sources.
//!
//! This crate provides:
//!
//! - **Flag extraction**: per-coded-picture progressive/rff/tff records from
//!   a section index or a DGIndex project
//! - **Cadence detection**: statistical cycle detection plus a strict
//!   linearity check
//! - **VFR to CFR**: duplicate-based `ceil` and decimation-based `floor`,
//!   keeping frames and flags index-aligned
//! - **Adaptive deinterlacing**: per-frame choice between a cheap field
//!   matcher and an expensive motion-adaptive deinterlacer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulldown_cadence::{d2v, EvaluatorConfig, FloorOptions, PulldownSource};
//!
//! let project = d2v::parse(&std::fs::read_to_string("movie.d2v")?)?;
//! let source = PulldownSource::from_d2v(decoded_frames, &project)?;
//! source.log_summary();
//!
//! // Decimate interlaced sections down to the film rate
//! let source = source.floor(FloorOptions::default())?;
//!
//! // Field match where possible, deinterlace where needed
//! let output = source.deinterlace(&field_matcher, &deinterlacer, EvaluatorConfig::default())?;
//! let frame = output.frame(0)?;
//! ```
//!
//! ## Sequences
//!
//! Frames are never materialised up front. Every stage returns a new lazy
//! [`SharedSequence`](pulldown_core::SharedSequence); pulling frame `n`
//! resolves it through the index tables built at setup. Configuration
//! errors surface at setup, before any frame is produced.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod classifier;
pub mod converter;
pub mod d2v;
pub mod error;
pub mod evaluator;
pub mod metadata;
pub mod paired;
pub mod source;
pub mod standard;

// Re-export main types
pub use analyzer::{analyze, linear_cycle, Cadence};
pub use classifier::{classify, DecisionPolicy, FrameClass};
pub use converter::{CadenceConverter, CadenceStream, FloorOptions, FloorPlan, SectionFloor};
pub use error::{PulldownError, Result};
pub use evaluator::{AdaptiveEvaluator, AdaptiveSequence, EvaluatorConfig};
pub use metadata::{extract_flags, is_vfr, section_ranges, FlagRecord, IndexData, SectionId};
pub use paired::{partition_runs, PairedSequence, Run};
pub use source::{PulldownSource, SourceSummary};
pub use standard::{AspectRatio, VideoStandard};
