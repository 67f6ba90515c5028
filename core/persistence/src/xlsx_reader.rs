//! FILENAME: core/persistence/src/xlsx_reader.rs

use crate::xlsx_styles::XlsxPackage;
use crate::{PersistenceError, Sheet, Workbook};
use calamine::{open_workbook, CellErrorType, Data, Reader, Xlsx};
use sheet::{Cell, CellError, CellRange, CellValue, StyleRegistry};
use std::collections::HashMap;
use std::path::Path;

pub fn load_xlsx(path: &Path) -> Result<Workbook, PersistenceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err(PersistenceError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }

    workbook.load_merged_regions()?;

    // Register every cellXfs entry once; xf id -> registry index.
    let mut package = XlsxPackage::open(path)?;
    let mut styles = StyleRegistry::new();
    let xf_to_style: Vec<usize> = package
        .cell_styles()?
        .into_iter()
        .map(|style| styles.get_or_create(style))
        .collect();

    let mut sheets = Vec::new();

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| PersistenceError::InvalidFormat(e.to_string()))?;
        let layout = package.sheet_layout(sheet_name)?;

        let mut sheet = Sheet::new(sheet_name.clone());
        sheet.column_widths = layout.column_widths;
        sheet.row_heights = layout.row_heights;

        // Cell positions from calamine are relative to the first used cell.
        let (origin_row, origin_col) = range.start().unwrap_or((0, 0));
        let mut values: HashMap<(u32, u32), CellValue> = HashMap::new();

        for (row_idx, col_idx, cell) in range.used_cells() {
            let value = match cell {
                Data::Empty => continue,
                Data::String(s) => CellValue::Text(s.clone()),
                Data::Float(f) => CellValue::Number(*f),
                Data::Int(i) => CellValue::Number(*i as f64),
                Data::Bool(b) => CellValue::Boolean(*b),
                Data::Error(e) => CellValue::Error(convert_error(e)),
                Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
                Data::DateTimeIso(s) => CellValue::Text(s.clone()),
                Data::DurationIso(s) => CellValue::Text(s.clone()),
            };
            values.insert(
                (origin_row + row_idx as u32, origin_col + col_idx as u32),
                value,
            );
        }

        // Styled blanks are kept so template formatting survives.
        for (coord, xf) in &layout.cell_xf {
            let style_index = xf_to_style.get(*xf).copied().unwrap_or(0);
            let value = values.remove(coord).unwrap_or(CellValue::Empty);
            let cell = Cell { value, style_index };
            if !cell.is_blank() {
                sheet.grid.set_cell(coord.0, coord.1, cell);
            }
        }
        for ((row, col), value) in values {
            sheet.grid.set_cell(row, col, Cell { value, style_index: 0 });
        }

        for (_, _, dims) in workbook.merged_regions_by_sheet(sheet_name) {
            sheet.grid.merge(CellRange::new(dims.start, dims.end));
        }

        sheets.push(sheet);
    }

    Ok(Workbook {
        sheets,
        styles,
        active_sheet: 0,
    })
}

fn convert_error(e: &CellErrorType) -> CellError {
    match e {
        CellErrorType::Div0 => CellError::Div0,
        CellErrorType::NA => CellError::NA,
        CellErrorType::Name => CellError::Name,
        CellErrorType::Null => CellError::Null,
        CellErrorType::Num => CellError::Num,
        CellErrorType::Ref => CellError::Ref,
        CellErrorType::Value | CellErrorType::GettingData => CellError::Value,
    }
}
