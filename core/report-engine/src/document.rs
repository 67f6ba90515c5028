//! FILENAME: core/report-engine/src/document.rs
//! PURPOSE: The grid operations the generator needs from a spreadsheet.
//! CONTEXT: Coordinates are 0-based (row, col). Style ids are opaque handles
//! owned by the document; 0 is the default style. `Workbook` from the
//! persistence crate is the production implementation.

use crate::error::ReportError;
use persistence::{PersistenceError, Sheet, Workbook};
use sheet::{Cell, CellCoord, CellRange, CellValue};
use std::path::Path;

pub trait SheetDocument {
    fn sheet_names(&self) -> Vec<String>;

    fn cell_value(&self, sheet: &str, at: CellCoord) -> Result<CellValue, ReportError>;

    fn cell_style(&self, sheet: &str, at: CellCoord) -> Result<usize, ReportError>;

    fn cell_text(&self, sheet: &str, at: CellCoord) -> Result<String, ReportError> {
        Ok(self.cell_value(sheet, at)?.display_string())
    }

    /// Writes a value, keeping the cell's style.
    fn set_cell_value(&mut self, sheet: &str, at: CellCoord, value: CellValue)
        -> Result<(), ReportError>;

    fn set_cell_style(&mut self, sheet: &str, at: CellCoord, style: usize)
        -> Result<(), ReportError>;

    /// Inserts `count` rows before row `at`, shifting everything at or below it.
    fn insert_rows(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), ReportError>;

    /// Inserts `count` columns before column `at`, shifting everything at or
    /// right of it.
    fn insert_cols(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), ReportError>;

    fn merge_cells(&mut self, sheet: &str, range: CellRange) -> Result<(), ReportError>;

    fn merged_regions(&self, sheet: &str) -> Result<Vec<CellRange>, ReportError>;

    /// Bounding range of the cells and merges in use, `None` for an empty sheet.
    fn dimension(&self, sheet: &str) -> Result<Option<CellRange>, ReportError>;

    fn create_sheet(&mut self, name: &str) -> Result<(), ReportError>;

    /// Adds `new_name` as a full copy of `source`.
    fn copy_sheet(&mut self, source: &str, new_name: &str) -> Result<(), ReportError>;

    fn delete_sheet(&mut self, name: &str) -> Result<(), ReportError>;

    fn set_active_sheet(&mut self, index: usize) -> Result<(), ReportError>;

    fn save(&self, path: &Path) -> Result<(), ReportError>;
}

fn sheet_ref<'w>(workbook: &'w Workbook, name: &str) -> Result<&'w Sheet, ReportError> {
    workbook
        .sheet(name)
        .ok_or_else(|| PersistenceError::SheetNotFound(name.to_string()).into())
}

fn sheet_mut<'w>(workbook: &'w mut Workbook, name: &str) -> Result<&'w mut Sheet, ReportError> {
    workbook
        .sheet_mut(name)
        .ok_or_else(|| PersistenceError::SheetNotFound(name.to_string()).into())
}

impl SheetDocument for Workbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn cell_value(&self, sheet: &str, at: CellCoord) -> Result<CellValue, ReportError> {
        Ok(sheet_ref(self, sheet)?
            .grid
            .get_cell(at.0, at.1)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty))
    }

    fn cell_style(&self, sheet: &str, at: CellCoord) -> Result<usize, ReportError> {
        Ok(sheet_ref(self, sheet)?
            .grid
            .get_cell(at.0, at.1)
            .map_or(0, |c| c.style_index))
    }

    fn set_cell_value(
        &mut self,
        sheet: &str,
        at: CellCoord,
        value: CellValue,
    ) -> Result<(), ReportError> {
        let grid = &mut sheet_mut(self, sheet)?.grid;
        let style_index = grid.get_cell(at.0, at.1).map_or(0, |c| c.style_index);
        let cell = Cell { value, style_index };
        if cell.is_blank() {
            grid.clear_cell(at.0, at.1);
        } else {
            grid.set_cell(at.0, at.1, cell);
        }
        Ok(())
    }

    fn set_cell_style(
        &mut self,
        sheet: &str,
        at: CellCoord,
        style: usize,
    ) -> Result<(), ReportError> {
        let grid = &mut sheet_mut(self, sheet)?.grid;
        let value = grid
            .get_cell(at.0, at.1)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty);
        let cell = Cell { value, style_index: style };
        if cell.is_blank() {
            grid.clear_cell(at.0, at.1);
        } else {
            grid.set_cell(at.0, at.1, cell);
        }
        Ok(())
    }

    fn insert_rows(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), ReportError> {
        sheet_mut(self, sheet)?.insert_rows(at, count);
        Ok(())
    }

    fn insert_cols(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), ReportError> {
        sheet_mut(self, sheet)?.insert_cols(at, count);
        Ok(())
    }

    fn merge_cells(&mut self, sheet: &str, range: CellRange) -> Result<(), ReportError> {
        sheet_mut(self, sheet)?.grid.merge(range);
        Ok(())
    }

    fn merged_regions(&self, sheet: &str) -> Result<Vec<CellRange>, ReportError> {
        Ok(sheet_ref(self, sheet)?.grid.merged_regions().to_vec())
    }

    fn dimension(&self, sheet: &str) -> Result<Option<CellRange>, ReportError> {
        Ok(sheet_ref(self, sheet)?.grid.dimension())
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), ReportError> {
        self.add_sheet(name)?;
        Ok(())
    }

    fn copy_sheet(&mut self, source: &str, new_name: &str) -> Result<(), ReportError> {
        Workbook::copy_sheet(self, source, new_name)?;
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<(), ReportError> {
        Workbook::delete_sheet(self, name)?;
        Ok(())
    }

    fn set_active_sheet(&mut self, index: usize) -> Result<(), ReportError> {
        if index >= self.sheets.len() {
            return Err(PersistenceError::SheetNotFound(format!("#{}", index)).into());
        }
        self.active_sheet = index;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ReportError> {
        persistence::save_xlsx(self, path)?;
        Ok(())
    }
}
