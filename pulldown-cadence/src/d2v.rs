//! DGIndex project (`.d2v`) reader.
//!
//! A project file looks like:
//!
//! ```text
//! DGIndexProjectFile16
//! 1
//! /path/to/VTS_01_1.VOB
//!
//! Stream_Type=1
//! Picture_Size=720x480
//! Frame_Rate=29970 (30000/1001)
//! Location=0,0,0,2f7
//!
//! 900 5 0 2048 0 1 1 d2 b2 a2 b2
//! 900 5 0 30720 0 1 1 92 b2 a2 b2 ff
//!
//! FINISHED  100.00% FILM
//! ```
//!
//! Each data line is one GOP: `info matrix file position skip vob cell`
//! followed by one hex flag byte per coded picture. `ff` ends the stream.

use crate::error::{PulldownError, Result};
use crate::metadata::{IndexData, IndexFlag, IndexSection};
use bitflags::bitflags;
use pulldown_core::Rational;
use std::collections::BTreeMap;
use tracing::debug;

/// Only this header version is understood.
pub const HEADER: &str = "DGIndexProjectFile16";

/// Flag byte marking the end of the stream.
const END_OF_STREAM: u8 = 0xFF;

bitflags! {
    /// Per-picture flag byte of a data line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PictureFlags: u8 {
        /// Repeat first field.
        const RFF = 0x01;
        /// Top field first.
        const TFF = 0x02;
        /// Picture coding type (two bits).
        const PICTURE_TYPE = 0x30;
        /// Progressive frame.
        const PROGRESSIVE = 0x40;
        /// Decodable without the previous GOP.
        const CLOSED_GOP = 0x80;
    }
}

/// MPEG picture coding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// Intra coded.
    I,
    /// Predicted.
    P,
    /// Bidirectionally predicted.
    B,
}

impl PictureFlags {
    /// Picture coding type, if the two type bits hold a valid value.
    pub fn picture_type(&self) -> Option<PictureType> {
        match (self.bits() & Self::PICTURE_TYPE.bits()) >> 4 {
            1 => Some(PictureType::I),
            2 => Some(PictureType::P),
            3 => Some(PictureType::B),
            _ => None,
        }
    }

    /// Flag triple consumed by the flag extractor.
    pub fn to_index_flag(&self) -> IndexFlag {
        IndexFlag {
            progressive_frame: self.contains(Self::PROGRESSIVE),
            rff: self.contains(Self::RFF),
            tff: self.contains(Self::TFF),
        }
    }
}

/// One GOP entry of the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct D2vLine {
    /// Info bits (hex).
    pub info: u32,
    /// Colour matrix.
    pub matrix: u8,
    /// Index into the project file list.
    pub file: usize,
    /// Byte position of the GOP in that file.
    pub position: u64,
    /// Leading pictures to skip.
    pub skip: u32,
    /// VOB id.
    pub vob: u32,
    /// Cell id.
    pub cell: u32,
    /// Flags of each coded picture, end marker excluded.
    pub pictures: Vec<PictureFlags>,
}

/// A parsed DGIndex project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct D2vProject {
    /// Source files in index order.
    pub files: Vec<String>,
    /// `Key=Value` settings.
    pub settings: BTreeMap<String, String>,
    /// Data lines in stream order.
    pub lines: Vec<D2vLine>,
    /// Trailing `FINISHED` line, if present.
    pub trailer: Option<String>,
}

impl D2vProject {
    /// Get a raw setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// `Picture_Size` as `(width, height)`.
    pub fn picture_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self.setting("Picture_Size")?.split_once('x')?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }

    /// Exact `Frame_Rate`, read from its parenthesised `num/den` part.
    pub fn frame_rate(&self) -> Option<Rational> {
        let value = self.setting("Frame_Rate")?;
        let exact = value.split_once('(')?.1.trim_end_matches(')');
        let (num, den) = exact.split_once('/')?;
        let (num, den): (i64, i64) = (num.trim().parse().ok()?, den.trim().parse().ok()?);
        (den != 0).then(|| Rational::new(num, den))
    }

    /// Display aspect ratio setting, e.g. `16:9`.
    pub fn aspect_ratio(&self) -> Option<&str> {
        self.setting("Aspect_Ratio")
    }

    /// Number of coded pictures across all data lines.
    pub fn coded_pictures(&self) -> usize {
        self.lines.iter().map(|l| l.pictures.len()).sum()
    }

    /// Convert to the section/flags index used by the extractor.
    pub fn to_index(&self) -> IndexData {
        IndexData {
            sections: self
                .lines
                .iter()
                .map(|line| IndexSection {
                    vob: line.vob,
                    cell: line.cell,
                    flags: Some(line.pictures.iter().map(PictureFlags::to_index_flag).collect()),
                })
                .collect(),
        }
    }
}

/// Parse a DGIndex project file.
pub fn parse(text: &str) -> Result<D2vProject> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim_end()));

    match lines.next() {
        Some((_, HEADER)) => {}
        Some((_, other)) if other.starts_with("DGIndexProjectFile") => {
            return Err(PulldownError::format(format!(
                "unsupported project version {other:?}, expected {HEADER}"
            )))
        }
        _ => return Err(PulldownError::format("not a DGIndex project file")),
    }

    let (line_no, count) = lines
        .next()
        .ok_or_else(|| PulldownError::format("missing file count"))?;
    let count: usize = count
        .trim()
        .parse()
        .map_err(|_| PulldownError::format(format!("line {line_no}: bad file count {count:?}")))?;

    let mut project = D2vProject::default();
    for _ in 0..count {
        let (_, path) = lines
            .next()
            .ok_or_else(|| PulldownError::format("file list is truncated"))?;
        project.files.push(path.to_string());
    }

    let mut lines = lines.skip_while(|(_, l)| l.is_empty());
    for (line_no, line) in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            PulldownError::format(format!("line {line_no}: expected Key=Value, got {line:?}"))
        })?;
        project.settings.insert(key.to_string(), value.to_string());
    }

    let mut ended = false;
    for (line_no, line) in lines.skip_while(|(_, l)| l.is_empty()) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("FINISHED") {
            project.trailer = Some(line.to_string());
            break;
        }
        if ended {
            return Err(PulldownError::format(format!(
                "line {line_no}: data after end-of-stream marker"
            )));
        }
        let (data, end) = parse_data_line(line_no, line)?;
        ended = end;
        project.lines.push(data);
    }

    if project.lines.is_empty() {
        return Err(PulldownError::format("project has no data lines"));
    }

    debug!(
        "Parsed d2v project: {} files, {} GOPs, {} coded pictures",
        project.files.len(),
        project.lines.len(),
        project.coded_pictures()
    );
    Ok(project)
}

/// Parse one data line; the flag reports whether it carried the end marker.
fn parse_data_line(line_no: usize, line: &str) -> Result<(D2vLine, bool)> {
    let bad = |what: &str| PulldownError::format(format!("line {line_no}: bad {what} in {line:?}"));
    let mut fields = line.split_whitespace();
    let mut next = |what: &'static str| fields.next().ok_or_else(|| bad(what));

    let info = u32::from_str_radix(next("info")?, 16).map_err(|_| bad("info"))?;
    let matrix = next("matrix")?.parse().map_err(|_| bad("matrix"))?;
    let file = next("file")?.parse().map_err(|_| bad("file"))?;
    let position = next("position")?.parse().map_err(|_| bad("position"))?;
    let skip = next("skip")?.parse().map_err(|_| bad("skip"))?;
    let vob = next("vob")?.parse().map_err(|_| bad("vob"))?;
    let cell = next("cell")?.parse().map_err(|_| bad("cell"))?;

    let mut pictures = Vec::new();
    let mut end = false;
    for token in fields {
        let byte = u8::from_str_radix(token, 16).map_err(|_| bad("flag byte"))?;
        if byte == END_OF_STREAM {
            end = true;
            break;
        }
        pictures.push(PictureFlags::from_bits_retain(byte));
    }

    Ok((
        D2vLine {
            info,
            matrix,
            file,
            position,
            skip,
            vob,
            cell,
            pictures,
        },
        end,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract_flags;

    const PROJECT: &str = "DGIndexProjectFile16
1
/media/VTS_01_1.VOB

Stream_Type=1
Aspect_Ratio=4:3
Picture_Size=720x480
Frame_Rate=29970 (30000/1001)
Location=0,0,0,2f7

900 5 0 2048 0 1 1 d3 70 71 72
900 5 0 30720 0 1 2 92 b2 a2 b2 ff

FINISHED  100.00% FILM
";

    #[test]
    fn test_parse_project() {
        let project = parse(PROJECT).unwrap();
        assert_eq!(project.files, vec!["/media/VTS_01_1.VOB".to_string()]);
        assert_eq!(project.picture_size(), Some((720, 480)));
        assert_eq!(project.frame_rate(), Some(Rational::NTSC));
        assert_eq!(project.aspect_ratio(), Some("4:3"));
        assert_eq!(project.lines.len(), 2);
        assert_eq!(project.lines[1].position, 30720);
        assert_eq!(project.lines[1].cell, 2);
        assert_eq!(project.coded_pictures(), 8);
        assert_eq!(project.trailer.as_deref(), Some("FINISHED  100.00% FILM"));
    }

    #[test]
    fn test_picture_flags() {
        let flags = PictureFlags::from_bits_retain(0xd3);
        assert!(flags.contains(PictureFlags::RFF | PictureFlags::TFF | PictureFlags::PROGRESSIVE));
        assert!(flags.contains(PictureFlags::CLOSED_GOP));
        assert_eq!(flags.picture_type(), Some(PictureType::I));

        let flags = PictureFlags::from_bits_retain(0xb2);
        assert_eq!(flags.picture_type(), Some(PictureType::B));
        assert!(!flags.contains(PictureFlags::PROGRESSIVE));
        assert_eq!(PictureFlags::empty().picture_type(), None);
    }

    #[test]
    fn test_to_index_feeds_extractor() {
        let project = parse(PROJECT).unwrap();
        let records = extract_flags(Some(&project.to_index())).unwrap();
        assert_eq!(records.len(), 8);
        assert!(records[0].is_progressive_pulldown());
        assert!(records[1].progressive);
        assert!(!records[1].repeat_first_field && !records[1].top_field_first);
        assert_eq!(records[4].section_id.fine, 2);
        assert!(!records[4].progressive && records[4].top_field_first);
    }

    #[test]
    fn test_rejects_other_versions() {
        let text = PROJECT.replace("ProjectFile16", "ProjectFile05");
        assert!(matches!(parse(&text), Err(PulldownError::Format(_))));
        assert!(matches!(parse("hello"), Err(PulldownError::Format(_))));
    }

    #[test]
    fn test_rejects_bad_data_line() {
        let text = PROJECT.replace("900 5 0 2048 0 1 1", "900 5 0 2048 0 1");
        let err = parse(&text).unwrap_err();
        assert!(err.to_string().contains("line 11"));
    }
}
