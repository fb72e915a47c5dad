//! Per-coded-frame flag metadata.
//!
//! An indexer reports, for every coded picture, whether it was progressively
//! coded and how its fields are meant to be displayed. The index is grouped
//! into source sections (VOB id / cell id on DVD sources); [`extract_flags`]
//! flattens it into one [`FlagRecord`] per coded frame.

use crate::error::{PulldownError, Result};
use pulldown_core::FrameProps;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Frame property keys written by [`FlagRecord::stamp`].
pub mod keys {
    /// Progressive coding flag (0/1).
    pub const PROGRESSIVE: &str = "_Progressive";
    /// Repeat-first-field flag (0/1).
    pub const REPEAT_FIRST_FIELD: &str = "_RepeatFirstField";
    /// Top-field-first flag (0/1).
    pub const TOP_FIELD_FIRST: &str = "_TopFieldFirst";
    /// Source section, formatted `coarse:fine`.
    pub const SECTION_ID: &str = "_SectionId";
}

/// Identifier of the source segment a coded frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SectionId {
    /// Coarse id (VOB id).
    pub coarse: u32,
    /// Fine id (cell id).
    pub fine: u32,
}

impl SectionId {
    /// Create a section id.
    pub const fn new(coarse: u32, fine: u32) -> Self {
        Self { coarse, fine }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coarse, self.fine)
    }
}

/// Coding flags of one coded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagRecord {
    /// Frame is progressively coded.
    pub progressive: bool,
    /// An extra field repetition is signalled (telecine marker).
    pub repeat_first_field: bool,
    /// Top field is displayed first.
    pub top_field_first: bool,
    /// Originating source section.
    pub section_id: SectionId,
}

impl FlagRecord {
    /// Create a record in section `0:0`.
    pub const fn new(progressive: bool, repeat_first_field: bool, top_field_first: bool) -> Self {
        Self {
            progressive,
            repeat_first_field,
            top_field_first,
            section_id: SectionId::new(0, 0),
        }
    }

    /// Same record placed in `section_id`.
    pub fn in_section(self, section_id: SectionId) -> Self {
        Self { section_id, ..self }
    }

    /// Progressive frame whose pulldown asks for an extra display, without
    /// needing interlaced reconstruction.
    pub fn is_progressive_pulldown(&self) -> bool {
        self.progressive && self.repeat_first_field && self.top_field_first
    }

    /// Copy with the repeat-first-field flag cleared.
    pub fn without_rff(self) -> Self {
        Self {
            repeat_first_field: false,
            ..self
        }
    }

    /// Write this record into a frame's property bag.
    pub fn stamp(&self, props: &mut FrameProps) {
        props.set(keys::PROGRESSIVE, self.progressive);
        props.set(keys::REPEAT_FIRST_FIELD, self.repeat_first_field);
        props.set(keys::TOP_FIELD_FIRST, self.top_field_first);
        props.set(keys::SECTION_ID, self.section_id.to_string());
    }

    /// Read a record back from a stamped property bag.
    pub fn from_props(props: &FrameProps) -> Option<Self> {
        let section_id = props
            .get(keys::SECTION_ID)
            .and_then(|v| v.as_data())
            .and_then(|s| {
                let (coarse, fine) = s.split_once(':')?;
                Some(SectionId::new(coarse.parse().ok()?, fine.parse().ok()?))
            })?;
        Some(Self {
            progressive: props.get_bool(keys::PROGRESSIVE)?,
            repeat_first_field: props.get_bool(keys::REPEAT_FIRST_FIELD)?,
            top_field_first: props.get_bool(keys::TOP_FIELD_FIRST)?,
            section_id,
        })
    }
}

/// Flag triple as stored in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFlag {
    /// Progressive coding flag.
    pub progressive_frame: bool,
    /// Repeat-first-field flag.
    pub rff: bool,
    /// Top-field-first flag.
    pub tff: bool,
}

/// One source section of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSection {
    /// Coarse section id (VOB id).
    #[serde(default)]
    pub vob: u32,
    /// Fine section id (cell id).
    #[serde(default)]
    pub cell: u32,
    /// Per-picture flags in coded order. `None` marks a malformed section.
    pub flags: Option<Vec<IndexFlag>>,
}

/// Parsed index: ordered source sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexData {
    /// Sections in stream order.
    #[serde(default)]
    pub sections: Vec<IndexSection>,
}

impl IndexData {
    /// Decode an index from JSON. `null` is reported as absent index data.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: Option<IndexData> = serde_json::from_str(json)?;
        data.ok_or_else(|| PulldownError::format("index data is absent"))
    }
}

/// Flatten an index into per-coded-frame records.
pub fn extract_flags(index: Option<&IndexData>) -> Result<Vec<FlagRecord>> {
    let index = index.ok_or_else(|| PulldownError::format("index data is absent"))?;
    if index.sections.is_empty() {
        return Err(PulldownError::format("index contains no sections"));
    }

    let mut records = Vec::new();
    for (i, section) in index.sections.iter().enumerate() {
        let flags = section.flags.as_ref().ok_or_else(|| {
            PulldownError::format(format!(
                "section {i} (vob {}, cell {}) has no flags list",
                section.vob, section.cell
            ))
        })?;
        let section_id = SectionId::new(section.vob, section.cell);
        records.extend(flags.iter().map(|f| FlagRecord {
            progressive: f.progressive_frame,
            repeat_first_field: f.rff,
            top_field_first: f.tff,
            section_id,
        }));
    }
    Ok(records)
}

/// Content mixes progressive pulldown frames with interlaced frames, so its
/// display rate changes between sections.
pub fn is_vfr(flags: &[FlagRecord]) -> bool {
    flags.iter().any(FlagRecord::is_progressive_pulldown) && flags.iter().any(|f| !f.progressive)
}

/// Inclusive coded-index range of each contiguous run of one section id.
pub fn section_ranges(flags: &[FlagRecord]) -> Vec<(SectionId, RangeInclusive<usize>)> {
    let mut ranges: Vec<(SectionId, RangeInclusive<usize>)> = Vec::new();
    for (i, flag) in flags.iter().enumerate() {
        match ranges.last_mut() {
            Some((id, range)) if *id == flag.section_id => *range = *range.start()..=i,
            _ => ranges.push((flag.section_id, i..=i)),
        }
    }
    ranges
}
