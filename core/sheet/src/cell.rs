//! FILENAME: core/sheet/src/cell.rs
//! PURPOSE: Defines the fundamental data structures for a single worksheet cell.
//! CONTEXT: This file contains the `Cell` struct and `CellValue` enum.
//! `CellValue` doubles as the scalar type of fetched data rows, so its
//! string form is the one used for filtering and placeholder substitution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the possible errors a cell can hold (e.g., #DIV/0!)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellError {
    Div0,  // Division by zero
    Ref,   // Invalid reference
    Name,  // Unknown function name
    Value, // Wrong type of argument
    NA,    // Value not available
    Num,   // Invalid numeric value
    Null,  // Empty intersection
}

impl CellError {
    /// Returns the Excel spelling of the error (e.g. "#DIV/0!").
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Div0 => "#DIV/0!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Value => "#VALUE!",
            CellError::NA => "#N/A",
            CellError::Num => "#NUM!",
            CellError::Null => "#NULL!",
        }
    }
}

/// Represents the stored value of a cell, or one scalar of a data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl CellValue {
    /// Returns the canonical string form of the value.
    ///
    /// Integral numbers print without a decimal part ("20", not "20.0"),
    /// booleans print as "true"/"false" and `Empty` prints as "".
    pub fn display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Error(e) => e.as_str().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

/// The atomic unit of the worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub style_index: usize,
}

impl Cell {
    pub fn new() -> Self {
        Cell {
            value: CellValue::Empty,
            style_index: 0,
        }
    }

    pub fn new_number(num: f64) -> Self {
        Cell {
            value: CellValue::Number(num),
            style_index: 0,
        }
    }

    pub fn new_text(text: impl Into<String>) -> Self {
        Cell {
            value: CellValue::Text(text.into()),
            style_index: 0,
        }
    }

    pub fn with_style(mut self, style_index: usize) -> Self {
        self.style_index = style_index;
        self
    }

    /// A cell with no value and the default style carries no information
    /// and is not kept in the grid.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}
