//! Video frame buffer abstractions.
//!
//! A [`Frame`] couples decoded pixel planes with a property bag. The bag
//! carries the container-level field parity (`_FieldBased`), the combed
//! signal reported by field matchers, and any per-frame metadata stamped by
//! later stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pixel format for video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp.
    Yuv420p,
    /// Planar YUV 4:2:2, 16bpp.
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp.
    Yuv444p,
    /// Grayscale, 8bpp.
    Gray8,
}

impl PixelFormat {
    /// Get the number of planes for this pixel format.
    pub fn num_planes(&self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Gray8 => 1,
        }
    }

    /// Get chroma subsampling factors (horizontal, vertical).
    pub fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p => (2, 2),
            Self::Yuv422p => (2, 1),
            Self::Yuv444p | Self::Gray8 => (1, 1),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yuv420p => write!(f, "yuv420p"),
            Self::Yuv422p => write!(f, "yuv422p"),
            Self::Yuv444p => write!(f, "yuv444p"),
            Self::Gray8 => write!(f, "gray8"),
        }
    }
}

/// Field structure signalled for a frame by its container or decoder.
///
/// Numeric values follow the common `_FieldBased` frame property convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldBased {
    /// Whole progressive frame.
    #[default]
    Progressive,
    /// Interlaced, bottom field first.
    BottomFieldFirst,
    /// Interlaced, top field first.
    TopFieldFirst,
}

impl FieldBased {
    /// Numeric `_FieldBased` value (0 frame, 1 bottom, 2 top).
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Progressive => 0,
            Self::BottomFieldFirst => 1,
            Self::TopFieldFirst => 2,
        }
    }

    /// Parse a numeric `_FieldBased` value.
    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Progressive),
            1 => Some(Self::BottomFieldFirst),
            2 => Some(Self::TopFieldFirst),
            _ => None,
        }
    }

    /// Whether the frame is made of two fields.
    pub fn is_interlaced(&self) -> bool {
        !matches!(self, Self::Progressive)
    }
}

/// Field order for interlaced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldOrder {
    /// Top field first (TFF) - even lines come first temporally.
    #[default]
    TopFieldFirst,
    /// Bottom field first (BFF) - odd lines come first temporally.
    BottomFieldFirst,
}

impl FieldOrder {
    /// Infer field order from a frame's field parity.
    ///
    /// A progressive frame counts as top field first.
    pub fn from_frame(frame: &Frame) -> Self {
        match frame.props.field_based {
            FieldBased::BottomFieldFirst => FieldOrder::BottomFieldFirst,
            FieldBased::Progressive | FieldBased::TopFieldFirst => FieldOrder::TopFieldFirst,
        }
    }

    /// Whether this is top field first.
    pub fn is_tff(&self) -> bool {
        matches!(self, FieldOrder::TopFieldFirst)
    }
}

/// A single value in a frame's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    /// Integer property (booleans are stored as 0/1).
    Int(i64),
    /// Floating point property.
    Float(f64),
    /// Text property.
    Data(String),
}

impl PropValue {
    /// Get the integer value, if this is an integer property.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the text value, if this is a data property.
    pub fn as_data(&self) -> Option<&str> {
        match self {
            PropValue::Data(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Data(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Data(v)
    }
}

/// Property bag attached to every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameProps {
    /// Field structure of the frame.
    pub field_based: FieldBased,
    /// Set by field matchers: `Some(true)` when the match left combing behind.
    pub combed: Option<bool>,
    values: BTreeMap<String, PropValue>,
}

impl FrameProps {
    /// Set a named property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a named property.
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.values.get(key)
    }

    /// Get a named integer property.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropValue::as_int)
    }

    /// Get a named integer property as a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_int(key).map(|v| v != 0)
    }

    /// Remove a named property.
    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.values.remove(key)
    }

    /// Iterate over the named properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A decoded video frame.
#[derive(Clone)]
pub struct Frame {
    buffer: Arc<FrameBuffer>,
    /// Frame properties.
    pub props: FrameProps,
}

impl Frame {
    /// Create a new black frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::from_buffer(FrameBuffer::new(width, height, format))
    }

    /// Create a frame from an existing buffer.
    pub fn from_buffer(buffer: FrameBuffer) -> Self {
        Self {
            buffer: Arc::new(buffer),
            props: FrameProps::default(),
        }
    }

    /// Get the frame width.
    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    /// Get the frame height.
    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    /// Get the pixel format.
    pub fn format(&self) -> PixelFormat {
        self.buffer.format
    }

    /// Get the frame buffer.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Get a mutable reference to the frame buffer, copying it if shared.
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        Arc::make_mut(&mut self.buffer)
    }

    /// Get a plane's data.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.buffer.plane(index)
    }

    /// Get a mutable reference to a plane's data.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.buffer_mut().plane_mut(index)
    }

    /// Whether two frames hold identical pixel data, ignoring properties.
    pub fn same_content(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer) || *self.buffer == *other.buffer
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .field("field_based", &self.props.field_based)
            .field("combed", &self.props.combed)
            .finish()
    }
}

/// A buffer for storing frame pixel data.
#[derive(Clone, PartialEq)]
pub struct FrameBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    planes: Vec<PlaneData>,
}

#[derive(Clone, PartialEq)]
struct PlaneData {
    data: Vec<u8>,
    stride: usize,
}

impl FrameBuffer {
    /// Create a new zero-filled frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let (hsub, vsub) = format.chroma_subsampling();

        let planes = (0..format.num_planes())
            .map(|plane| {
                let (plane_width, plane_height) = if plane == 0 {
                    (width as usize, height as usize)
                } else {
                    (
                        (width / hsub) as usize,
                        (height / vsub) as usize,
                    )
                };
                // Align stride to 32 bytes
                let stride = (plane_width + 31) & !31;
                PlaneData {
                    data: vec![0u8; stride * plane_height],
                    stride,
                }
            })
            .collect();

        Self {
            width,
            height,
            format,
            planes,
        }
    }

    /// Get the number of planes.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Get a plane's data.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(|p| p.data.as_slice())
    }

    /// Get a mutable reference to a plane's data.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(|p| p.data.as_mut_slice())
    }

    /// Get the stride for a plane.
    pub fn stride(&self, plane: usize) -> usize {
        self.planes.get(plane).map(|p| p.stride).unwrap_or(0)
    }

    /// Fill all planes with a value.
    pub fn fill(&mut self, value: u8) {
        for plane in &mut self.planes {
            plane.data.fill(value);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("planes", &self.planes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_planes() {
        let buffer = FrameBuffer::new(720, 480, PixelFormat::Yuv420p);
        assert_eq!(buffer.num_planes(), 3);
        assert!(buffer.plane(2).is_some());
        assert!(buffer.plane(3).is_none());
        assert_eq!(buffer.stride(0) % 32, 0);
        assert_eq!(buffer.stride(1), 384);
    }

    #[test]
    fn test_field_based_ints() {
        for fb in [
            FieldBased::Progressive,
            FieldBased::BottomFieldFirst,
            FieldBased::TopFieldFirst,
        ] {
            assert_eq!(FieldBased::from_int(fb.as_int()), Some(fb));
        }
        assert_eq!(FieldBased::from_int(3), None);
    }

    #[test]
    fn test_field_order_from_frame() {
        let mut frame = Frame::new(16, 16, PixelFormat::Gray8);
        assert_eq!(FieldOrder::from_frame(&frame), FieldOrder::TopFieldFirst);

        frame.props.field_based = FieldBased::BottomFieldFirst;
        assert_eq!(FieldOrder::from_frame(&frame), FieldOrder::BottomFieldFirst);

        frame.props.field_based = FieldBased::TopFieldFirst;
        assert!(FieldOrder::from_frame(&frame).is_tff());
    }

    #[test]
    fn test_props_bag() {
        let mut props = FrameProps::default();
        props.set("_Progressive", true);
        props.set("_SectionId", "1-2");
        assert_eq!(props.get_bool("_Progressive"), Some(true));
        assert_eq!(props.get("_SectionId").and_then(PropValue::as_data), Some("1-2"));
        assert!(props.remove("_Progressive").is_some());
        assert_eq!(props.get_int("_Progressive"), None);
    }

    #[test]
    fn test_same_content_ignores_props() {
        let mut a = Frame::new(16, 16, PixelFormat::Gray8);
        a.plane_mut(0).unwrap().fill(7);
        let mut b = a.clone();
        b.props.combed = Some(true);
        assert!(a.same_content(&b));

        b.plane_mut(0).unwrap()[0] = 8;
        assert!(!a.same_content(&b));
    }
}
