//! FILENAME: core/sheet/src/coord.rs
//! PURPOSE: Utilities for converting between spreadsheet coordinate formats.
//! CONTEXT: This module provides functions to convert between A1-style notation
//! (e.g., "A1", "AA100") and 0-based (row, col) numeric indices used internally,
//! plus the rectangular `CellRange` written as "TopLeft:BottomRight".
//! Column "A" = 0, "B" = 1, ..., "Z" = 25, "AA" = 26, etc.
//! Row 1 in A1 notation = row 0 internally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A cell coordinate as (row, col) with 0-based indices.
pub type CellCoord = (u32, u32);

/// Largest column index Excel accepts ("XFD").
pub const MAX_COL: u32 = 16_383;

/// Largest row index Excel accepts (row 1,048,576).
pub const MAX_ROW: u32 = 1_048_575;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("invalid range '{0}': expected two cell references joined by ':'")]
    Shape(String),

    #[error("invalid cell reference '{0}'")]
    CellRef(String),
}

/// Converts a column string (e.g., "A", "AA", "ABC") to a 0-based column index.
/// "A" -> 0, "B" -> 1, ..., "Z" -> 25, "AA" -> 26, "AB" -> 27, etc.
///
/// # Panics
/// Panics if the string is empty or contains non-alphabetic characters.
/// Use `parse_cell_ref` for untrusted input.
pub fn col_to_index(col_str: &str) -> u32 {
    let mut result: u32 = 0;
    for c in col_str.chars() {
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        result = result * 26 + digit;
    }
    result - 1 // Convert to 0-based
}

/// Converts a 0-based column index to a column string.
/// 0 -> "A", 1 -> "B", ..., 25 -> "Z", 26 -> "AA", 27 -> "AB", etc.
pub fn index_to_col(mut col_index: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col_index % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col_index < 26 {
            break;
        }
        col_index = col_index / 26 - 1;
    }
    result
}

/// Converts an A1-style reference to a 0-based (row, col) coordinate.
/// "A1" -> (0, 0), "B2" -> (1, 1), "AA100" -> (99, 26)
pub fn a1_to_coord(col_str: &str, row_num: u32) -> CellCoord {
    let col = col_to_index(col_str);
    let row = row_num - 1; // Convert 1-based to 0-based
    (row, col)
}

/// Converts a 0-based (row, col) coordinate to an A1-style reference string.
/// (0, 0) -> "A1", (1, 1) -> "B2", (99, 26) -> "AA100"
pub fn coord_to_a1(coord: CellCoord) -> String {
    let (row, col) = coord;
    let col_str = index_to_col(col);
    let row_num = row + 1; // Convert 0-based to 1-based
    format!("{}{}", col_str, row_num)
}

/// Parses a single A1 reference ("B12", "$B$12") into a 0-based coordinate.
/// Returns None for anything that is not letters followed by a positive row.
pub fn parse_cell_ref(reference: &str) -> Option<CellCoord> {
    let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let row_num: u32 = digits.parse().ok()?;
    if row_num == 0 {
        return None;
    }

    let (row, col) = a1_to_coord(letters, row_num);
    if row > MAX_ROW || col > MAX_COL {
        return None;
    }
    Some((row, col))
}

// ============================================================================
// CELL RANGE
// ============================================================================

/// A rectangular, inclusive block of cells with 0-based corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Builds a range from two corners, normalizing so start <= end.
    pub fn new(a: CellCoord, b: CellCoord) -> Self {
        CellRange {
            start_row: a.0.min(b.0),
            start_col: a.1.min(b.1),
            end_row: a.0.max(b.0),
            end_col: a.1.max(b.1),
        }
    }

    /// A 1x1 range.
    pub fn single(coord: CellCoord) -> Self {
        CellRange::new(coord, coord)
    }

    pub fn start(&self) -> CellCoord {
        (self.start_row, self.start_col)
    }

    pub fn end(&self) -> CellCoord {
        (self.end_row, self.end_col)
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.0 >= self.start_row
            && coord.0 <= self.end_row
            && coord.1 >= self.start_col
            && coord.1 <= self.end_col
    }

    /// True if `other` lies entirely inside this range.
    pub fn contains_range(&self, other: &CellRange) -> bool {
        self.contains(other.start()) && self.contains(other.end())
    }

    pub fn overlaps(&self, other: &CellRange) -> bool {
        !(other.end_row < self.start_row
            || other.start_row > self.end_row
            || other.end_col < self.start_col
            || other.start_col > self.end_col)
    }

    /// Moves the range by a non-negative (rows, cols) offset.
    pub fn offset(&self, rows: u32, cols: u32) -> CellRange {
        CellRange {
            start_row: self.start_row + rows,
            start_col: self.start_col + cols,
            end_row: self.end_row + rows,
            end_col: self.end_col + cols,
        }
    }

    /// Renders the range as "A1:B2" (single cells still use the two-part form).
    pub fn to_a1(&self) -> String {
        format!("{}:{}", coord_to_a1(self.start()), coord_to_a1(self.end()))
    }
}

impl FromStr for CellRange {
    type Err = RangeParseError;

    /// Parses exactly two A1 references joined by one ':'.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(RangeParseError::Shape(s.to_string()));
        }
        let start = parse_cell_ref(parts[0])
            .ok_or_else(|| RangeParseError::CellRef(parts[0].to_string()))?;
        let end = parse_cell_ref(parts[1])
            .ok_or_else(|| RangeParseError::CellRef(parts[1].to_string()))?;
        Ok(CellRange::new(start, end))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_to_index() {
        assert_eq!(col_to_index("A"), 0);
        assert_eq!(col_to_index("B"), 1);
        assert_eq!(col_to_index("Z"), 25);
        assert_eq!(col_to_index("AA"), 26);
        assert_eq!(col_to_index("AZ"), 51);
        assert_eq!(col_to_index("ZZ"), 701);
        assert_eq!(col_to_index("AAA"), 702);
    }

    #[test]
    fn test_index_to_col() {
        assert_eq!(index_to_col(0), "A");
        assert_eq!(index_to_col(25), "Z");
        assert_eq!(index_to_col(26), "AA");
        assert_eq!(index_to_col(701), "ZZ");
        assert_eq!(index_to_col(702), "AAA");
    }

    #[test]
    fn test_roundtrip() {
        for i in 0..1000 {
            let col_str = index_to_col(i);
            let back = col_to_index(&col_str);
            assert_eq!(back, i, "Roundtrip failed for index {}", i);
        }
    }

    #[test]
    fn test_coord_to_a1() {
        assert_eq!(coord_to_a1((0, 0)), "A1");
        assert_eq!(coord_to_a1((99, 26)), "AA100");
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("c3"), Some((2, 2)));
        assert_eq!(parse_cell_ref("$B$12"), Some((11, 1)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A1B"), None);
        assert_eq!(parse_cell_ref(""), None);
    }

    #[test]
    fn test_parse_range() {
        let range: CellRange = "A2:C3".parse().unwrap();
        assert_eq!(range.start(), (1, 0));
        assert_eq!(range.end(), (2, 2));
        assert_eq!(range.width(), 3);
        assert_eq!(range.height(), 2);
        assert_eq!(range.to_a1(), "A2:C3");
    }

    #[test]
    fn test_parse_degenerate_range() {
        let range: CellRange = "A1:A1".parse().unwrap();
        assert!(range.is_single_cell());
        assert_eq!(range.to_string(), "A1:A1");
    }

    #[test]
    fn test_parse_range_rejects_other_shapes() {
        assert!(matches!("A1".parse::<CellRange>(), Err(RangeParseError::Shape(_))));
        assert!(matches!("A1:B2:C3".parse::<CellRange>(), Err(RangeParseError::Shape(_))));
        assert!(matches!("A1:".parse::<CellRange>(), Err(RangeParseError::CellRef(_))));
        assert!(matches!("1A:B2".parse::<CellRange>(), Err(RangeParseError::CellRef(_))));
    }

    #[test]
    fn test_range_geometry() {
        let outer: CellRange = "A1:D4".parse().unwrap();
        let inner: CellRange = "B2:C3".parse().unwrap();
        let apart: CellRange = "F6:G7".parse().unwrap();
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(outer.overlaps(&inner));
        assert!(!outer.overlaps(&apart));
        assert_eq!(inner.offset(2, 1).to_a1(), "C4:D5");
    }
}
