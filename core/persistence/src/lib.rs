//! FILENAME: core/persistence/src/lib.rs
//! Report Persistence Module
//!
//! Loads XLSX templates into the in-memory `Workbook` model and saves
//! generated workbooks back to XLSX. Values and merged regions are read with
//! calamine; styles, column widths and row heights are read straight from the
//! package XML. Writing goes through rust_xlsxwriter.

mod error;
mod xlsx_reader;
mod xlsx_styles;
mod xlsx_writer;

pub use error::PersistenceError;
pub use xlsx_reader::load_xlsx;
pub use xlsx_writer::save_xlsx;

use sheet::{Grid, StyleRegistry};
use std::collections::HashMap;

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

// ============================================================================
// WORKBOOK
// ============================================================================

/// Represents a complete workbook that can be saved/loaded.
/// All sheets share one style registry so cells keep valid style indices
/// when they are copied between sheets.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    pub styles: StyleRegistry,
    pub active_sheet: usize,
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1".to_string())],
            styles: StyleRegistry::new(),
            active_sheet: 0,
        }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Finds a sheet by name. Excel sheet names are case-insensitive.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        let index = self.sheet_index(name)?;
        Some(&mut self.sheets[index])
    }

    /// Appends an empty sheet and returns its index.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize, PersistenceError> {
        self.check_new_name(name)?;
        self.sheets.push(Sheet::new(name.to_string()));
        Ok(self.sheets.len() - 1)
    }

    /// Appends a full copy of `source` (cells, merges, dimensions) named
    /// `new_name` and returns its index.
    pub fn copy_sheet(&mut self, source: &str, new_name: &str) -> Result<usize, PersistenceError> {
        let index = self
            .sheet_index(source)
            .ok_or_else(|| PersistenceError::SheetNotFound(source.to_string()))?;
        self.check_new_name(new_name)?;

        let mut copy = self.sheets[index].clone();
        copy.name = new_name.to_string();
        self.sheets.push(copy);
        Ok(self.sheets.len() - 1)
    }

    /// Removes a sheet. The last remaining sheet cannot be removed.
    pub fn delete_sheet(&mut self, name: &str) -> Result<(), PersistenceError> {
        let index = self
            .sheet_index(name)
            .ok_or_else(|| PersistenceError::SheetNotFound(name.to_string()))?;
        if self.sheets.len() == 1 {
            return Err(PersistenceError::InvalidFormat(
                "a workbook must keep at least one sheet".to_string(),
            ));
        }

        self.sheets.remove(index);
        if self.active_sheet > index || self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.active_sheet.saturating_sub(1);
        }
        Ok(())
    }

    fn check_new_name(&self, name: &str) -> Result<(), PersistenceError> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(PersistenceError::DuplicateSheet(name.to_string()));
        }
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a name against Excel's sheet naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), PersistenceError> {
    let invalid = name.trim().is_empty()
        || name.chars().count() > MAX_SHEET_NAME_LEN
        || name.chars().any(|c| FORBIDDEN_SHEET_CHARS.contains(&c))
        || name.starts_with('\'')
        || name.ends_with('\'');
    if invalid {
        return Err(PersistenceError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// SHEET
// ============================================================================

/// Represents a single worksheet
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: Grid,
    /// Column widths in pixels, keyed by 0-based column.
    pub column_widths: HashMap<u32, f64>,
    /// Row heights in points, keyed by 0-based row.
    pub row_heights: HashMap<u32, f64>,
}

impl Sheet {
    pub fn new(name: String) -> Self {
        Self {
            name,
            grid: Grid::new(),
            column_widths: HashMap::new(),
            row_heights: HashMap::new(),
        }
    }

    /// Inserts rows in the grid and moves custom row heights along with them.
    pub fn insert_rows(&mut self, at: u32, count: u32) {
        self.grid.insert_rows(at, count);
        self.row_heights = shift_keys(&self.row_heights, at, count);
    }

    /// Inserts columns in the grid and moves custom column widths along with them.
    pub fn insert_cols(&mut self, at: u32, count: u32) {
        self.grid.insert_cols(at, count);
        self.column_widths = shift_keys(&self.column_widths, at, count);
    }
}

fn shift_keys(map: &HashMap<u32, f64>, at: u32, count: u32) -> HashMap<u32, f64> {
    map.iter()
        .map(|(&k, &v)| if k >= at { (k + count, v) } else { (k, v) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet::{Cell, CellValue};

    #[test]
    fn test_sheet_names_are_case_insensitive() {
        let mut wb = Workbook::new();
        assert_eq!(wb.sheet_index("sheet1"), Some(0));
        assert!(matches!(wb.add_sheet("SHEET1"), Err(PersistenceError::DuplicateSheet(_))));
    }

    #[test]
    fn test_invalid_sheet_names() {
        let mut wb = Workbook::new();
        for bad in ["", "a/b", "x[1]", "'quoted'", "abcdefghijklmnopqrstuvwxyz0123456"] {
            assert!(
                matches!(wb.add_sheet(bad), Err(PersistenceError::InvalidSheetName(_))),
                "{bad} should be rejected"
            );
        }
        assert!(wb.add_sheet("Region North").is_ok());
    }

    #[test]
    fn test_copy_sheet_is_independent() {
        let mut wb = Workbook::new();
        wb.sheets[0].grid.set_cell(0, 0, Cell::new_text("{name}"));
        wb.sheets[0].column_widths.insert(0, 120.0);

        let idx = wb.copy_sheet("Sheet1", "Alice").unwrap();
        wb.sheets[idx].grid.set_cell(0, 0, Cell::new_text("Alice"));

        assert_eq!(wb.sheets[0].grid.get_cell(0, 0).unwrap().value, CellValue::from("{name}"));
        assert_eq!(wb.sheets[idx].column_widths.get(&0), Some(&120.0));
        assert_eq!(wb.sheet_names(), vec!["Sheet1", "Alice"]);
    }

    #[test]
    fn test_copy_missing_sheet() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.copy_sheet("Nope", "Copy"),
            Err(PersistenceError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_delete_sheet_adjusts_active() {
        let mut wb = Workbook::new();
        wb.add_sheet("B").unwrap();
        wb.add_sheet("C").unwrap();
        wb.active_sheet = 2;

        wb.delete_sheet("Sheet1").unwrap();
        assert_eq!(wb.active_sheet, 1);
        assert_eq!(wb.sheets[wb.active_sheet].name, "C");

        wb.delete_sheet("B").unwrap();
        assert!(matches!(wb.delete_sheet("C"), Err(PersistenceError::InvalidFormat(_))));
    }

    #[test]
    fn test_insert_rows_moves_heights() {
        let mut s = Sheet::new("S".into());
        s.row_heights.insert(0, 30.0);
        s.row_heights.insert(2, 18.0);
        s.insert_rows(1, 2);
        assert_eq!(s.row_heights.get(&0), Some(&30.0));
        assert_eq!(s.row_heights.get(&4), Some(&18.0));
        assert!(s.row_heights.get(&2).is_none());
    }
}
