//! FILENAME: core/report-engine/src/template.rs
//! PURPOSE: Captures a block's cells once and stamps them at new positions.
//! CONTEXT: A capture must be taken before the first stamp overwrites the
//! source cells. Stamping substitutes `{label}` placeholders from a row's
//! bindings, writes the captured style and re-creates the captured merges.

use crate::document::SheetDocument;
use crate::error::ReportError;
use sheet::{CellCoord, CellRange, CellValue};
use std::collections::HashMap;

/// Label name -> value for one data row.
pub type Bindings = HashMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq)]
struct CapturedCell {
    value: CellValue,
    style: usize,
}

/// Snapshot of a rectangular block: values, style ids and the merges that
/// lie entirely inside it, stored relative to the origin.
#[derive(Debug, Clone)]
pub struct TemplateCache {
    range: CellRange,
    cells: Vec<Vec<CapturedCell>>,
    merges: Vec<CellRange>,
}

impl TemplateCache {
    pub fn capture(
        doc: &dyn SheetDocument,
        sheet: &str,
        range: CellRange,
    ) -> Result<Self, ReportError> {
        let mut cells = Vec::with_capacity(range.height() as usize);
        for row in range.start_row..=range.end_row {
            let mut line = Vec::with_capacity(range.width() as usize);
            for col in range.start_col..=range.end_col {
                line.push(CapturedCell {
                    value: doc.cell_value(sheet, (row, col))?,
                    style: doc.cell_style(sheet, (row, col))?,
                });
            }
            cells.push(line);
        }

        let merges = doc
            .merged_regions(sheet)?
            .into_iter()
            .filter(|m| range.contains_range(m))
            .map(|m| {
                CellRange::new(
                    (m.start_row - range.start_row, m.start_col - range.start_col),
                    (m.end_row - range.start_row, m.end_col - range.start_col),
                )
            })
            .collect();

        Ok(TemplateCache { range, cells, merges })
    }

    pub fn origin(&self) -> CellCoord {
        self.range.start()
    }

    pub fn range(&self) -> CellRange {
        self.range
    }

    pub fn width(&self) -> u32 {
        self.range.width()
    }

    pub fn height(&self) -> u32 {
        self.range.height()
    }

    /// Writes the captured block with its top-left corner at `target`.
    /// Without bindings the captured values are written unchanged.
    pub fn stamp(
        &self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        target: CellCoord,
        bindings: Option<&Bindings>,
    ) -> Result<(), ReportError> {
        for (r, line) in self.cells.iter().enumerate() {
            for (c, cell) in line.iter().enumerate() {
                let at = (target.0 + r as u32, target.1 + c as u32);
                let value = match bindings {
                    Some(bindings) => render_value(&cell.value, bindings),
                    None => cell.value.clone(),
                };
                doc.set_cell_value(sheet, at, value)?;
                if cell.style != 0 {
                    doc.set_cell_style(sheet, at, cell.style)?;
                }
            }
        }

        for merge in &self.merges {
            doc.merge_cells(sheet, merge.offset(target.0, target.1))?;
        }
        Ok(())
    }
}

/// The value written for a captured cell. A cell that is exactly one bound
/// placeholder takes the bound number or boolean as is; other text with
/// placeholders becomes text.
fn render_value(value: &CellValue, bindings: &Bindings) -> CellValue {
    let text = match value {
        CellValue::Text(text) if text.contains('{') => text,
        other => return other.clone(),
    };

    if let Some(bound) = single_placeholder(text).and_then(|name| bindings.get(name)) {
        if matches!(bound, CellValue::Number(_) | CellValue::Boolean(_)) {
            return bound.clone();
        }
    }

    let rendered = substitute_placeholders(text, bindings);
    if rendered.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(rendered)
    }
}

fn single_placeholder(text: &str) -> Option<&str> {
    let name = text.strip_prefix('{')?.strip_suffix('}')?;
    (!name.contains(['{', '}'])).then_some(name)
}

/// Replaces each `{name}` bound in `bindings` with the value's string form.
/// Unbound placeholders stay as written and substituted text is not
/// scanned again.
pub fn substitute_placeholders(text: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after[close..].starts_with('}') => {
                let name = &after[..close];
                match bindings.get(name) {
                    Some(value) => out.push_str(&value.display_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
