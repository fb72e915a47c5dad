//! # Pulldown Core
//!
//! Core types shared by the pulldown crates.
//!
//! This crate provides:
//! - Error handling types
//! - Exact rational frame rates
//! - Frames with a property bag (field parity, combed signal, stamped metadata)
//! - Lazy, randomly accessible frame sequences and their combinators
//! - The frame transform capability used for field matchers and deinterlacers

pub mod error;
pub mod frame;
pub mod rational;
pub mod sequence;
pub mod transform;

pub use error::{Error, Result};
pub use frame::{FieldBased, FieldOrder, Frame, FrameBuffer, FrameProps, PixelFormat, PropValue};
pub use rational::Rational;
pub use sequence::{FrameSequence, IndexMapped, SequenceInfo, SharedSequence, Splice, VecSequence};
pub use transform::{FrameTransform, TransformConfig};
