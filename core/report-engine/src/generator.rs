//! FILENAME: core/report-engine/src/generator.rs
//! PURPOSE: Expands a workbook definition into a finished report document.
//! CONTEXT: Walks sheets and blocks in order. Every step mutates the
//! coordinate space the next step reads from (rows and columns are inserted
//! after a block's span), so the order here is significant:
//! expand, capture, then stamp.

use crate::context::GenerationContext;
use crate::definition::{BlockDefinition, BlockKind, DataViewDefinition, SheetDefinition};
use crate::document::SheetDocument;
use crate::error::ReportError;
use crate::fetcher::DataRow;
use crate::template::{Bindings, TemplateCache};
use log::{debug, info, warn};
use sheet::{CellCoord, CellRange};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// AXIS
// ============================================================================

/// The line kind a block repeats along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Rows,
    Columns,
}

impl Axis {
    fn of(block: &BlockDefinition) -> Axis {
        if block.is_horizontal() {
            Axis::Columns
        } else {
            Axis::Rows
        }
    }

    /// First and last line of `range` along this axis.
    fn span(self, range: &CellRange) -> (u32, u32) {
        match self {
            Axis::Rows => (range.start_row, range.end_row),
            Axis::Columns => (range.start_col, range.end_col),
        }
    }

    fn extent(self, range: &CellRange) -> u32 {
        let (start, end) = self.span(range);
        end - start + 1
    }

    /// Last line across this axis, e.g. the last used column for `Rows`.
    fn cross_end(self, dimension: &CellRange) -> u32 {
        match self {
            Axis::Rows => dimension.end_col,
            Axis::Columns => dimension.end_row,
        }
    }

    fn coord(self, line: u32, cross: u32) -> CellCoord {
        match self {
            Axis::Rows => (line, cross),
            Axis::Columns => (cross, line),
        }
    }

    /// Offset of the `index`-th repetition of `range`.
    fn step(self, range: &CellRange, index: u32) -> CellCoord {
        self.coord(index * self.extent(range), 0)
    }

    fn insert(
        self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        at: u32,
        count: u32,
    ) -> Result<(), ReportError> {
        match self {
            Axis::Rows => doc.insert_rows(sheet, at, count),
            Axis::Columns => doc.insert_cols(sheet, at, count),
        }
    }
}

/// Inserts room for `items` repetitions of `range` right after it.
/// Returns the number of inserted lines.
fn expand(
    doc: &mut dyn SheetDocument,
    sheet: &str,
    axis: Axis,
    range: &CellRange,
    items: usize,
) -> Result<u32, ReportError> {
    if items <= 1 {
        return Ok(0);
    }
    let count = (items as u32 - 1) * axis.extent(range);
    let (_, end) = axis.span(range);
    axis.insert(doc, sheet, end + 1, count)?;
    debug!("Inserted {} {:?} after line {} of '{}'", count, axis, end, sheet);
    Ok(count)
}

/// Copies lines `src.0..=src.1` cyclically into `count` lines starting at
/// `dest`. Only non-blank cells are written; merges are not copied.
fn copy_slice(
    doc: &mut dyn SheetDocument,
    sheet: &str,
    axis: Axis,
    src: (u32, u32),
    dest: u32,
    count: u32,
) -> Result<(), ReportError> {
    let cross_end = match doc.dimension(sheet)? {
        Some(dimension) => axis.cross_end(&dimension),
        None => return Ok(()),
    };

    let mut lines = Vec::with_capacity((src.1 - src.0 + 1) as usize);
    for line in src.0..=src.1 {
        let mut cells = Vec::new();
        for cross in 0..=cross_end {
            let at = axis.coord(line, cross);
            let value = doc.cell_value(sheet, at)?;
            let style = doc.cell_style(sheet, at)?;
            if !value.is_empty() || style != 0 {
                cells.push((cross, value, style));
            }
        }
        lines.push(cells);
    }

    for i in 0..count {
        let source = &lines[(i as usize) % lines.len()];
        for (cross, value, style) in source {
            let at = axis.coord(dest + i, *cross);
            doc.set_cell_value(sheet, at, value.clone())?;
            if *style != 0 {
                doc.set_cell_style(sheet, at, *style)?;
            }
        }
    }
    Ok(())
}

/// Replicates the matrix lines that were just inserted after `along`.
/// The source slice is the bounding span of every sub-block except `skip`,
/// the axis running the other way.
fn copy_template_slice(
    doc: &mut dyn SheetDocument,
    sheet: &str,
    matrix: &BlockDefinition,
    along: &BlockDefinition,
    skip: &BlockDefinition,
    count: u32,
) -> Result<(), ReportError> {
    if count == 0 {
        return Ok(());
    }
    let axis = Axis::of(along);

    let mut bounds: Option<(u32, u32)> = None;
    for sub in matrix.sub_blocks.iter().filter(|b| !std::ptr::eq(*b, skip)) {
        let (start, end) = axis.span(&sub.parsed_range()?);
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
            None => (start, end),
        });
    }

    match bounds {
        Some(src) => {
            let (_, along_end) = axis.span(&along.parsed_range()?);
            copy_slice(doc, sheet, axis, src, along_end + 1, count)
        }
        None => Ok(()),
    }
}

/// Label name -> value for the labels of `view` whose column is in `row`.
fn bind_row(view: Option<&DataViewDefinition>, row: &DataRow) -> Bindings {
    let mut bindings = Bindings::new();
    if let Some(view) = view {
        for label in &view.labels {
            if let Some(value) = row.get(&label.column) {
                bindings.insert(label.name.clone(), value.clone());
            }
        }
    }
    bindings
}

/// Substitutes `${key}` occurrences with parameter values.
pub fn replace_placeholders(input: &str, params: &HashMap<String, String>) -> String {
    params.iter().fold(input.to_string(), |text, (key, value)| {
        text.replace(&format!("${{{}}}", key), value)
    })
}

// ============================================================================
// GENERATOR
// ============================================================================

pub struct Generator<'a> {
    ctx: GenerationContext<'a>,
}

impl<'a> Generator<'a> {
    pub fn new(ctx: GenerationContext<'a>) -> Self {
        Generator { ctx }
    }

    pub fn context(&self) -> &GenerationContext<'a> {
        &self.ctx
    }

    /// Where `generate` writes the report under `output_root`.
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        let workbook = self.ctx.workbook();
        let params = self.ctx.parameters();
        let path = output_root.join(replace_placeholders(&workbook.output_dir, params));
        if path.extension().is_some() {
            return path;
        }
        path.join(format!("{}.xlsx", replace_placeholders(&workbook.name, params)))
    }

    /// Loads the template, renders every sheet and saves the result.
    /// Nothing is written unless every sheet succeeds.
    pub fn generate(
        &mut self,
        template_root: &Path,
        output_root: &Path,
    ) -> Result<PathBuf, ReportError> {
        let workbook = self.ctx.workbook();
        let template_path = template_root.join(&workbook.template);
        let output_path = self.output_path(output_root);
        info!(
            "Generating workbook '{}' from {}",
            workbook.name,
            template_path.display()
        );

        let mut doc = persistence::load_xlsx(&template_path)?;
        self.render(&mut doc)?;
        doc.set_active_sheet(0)?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        doc.save(&output_path)?;

        info!("Saved workbook '{}' to {}", workbook.name, output_path.display());
        Ok(output_path)
    }

    /// Processes every configured sheet of `doc` in order.
    pub fn render(&mut self, doc: &mut dyn SheetDocument) -> Result<(), ReportError> {
        let workbook = self.ctx.workbook();
        for sheet in &workbook.sheets {
            info!("Processing sheet '{}'", sheet.name);
            self.process_sheet(doc, sheet)
                .map_err(|e| e.in_sheet(&sheet.name))?;
        }
        Ok(())
    }

    pub fn process_sheet(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &SheetDefinition,
    ) -> Result<(), ReportError> {
        if sheet.dynamic {
            return self.process_dynamic_sheet(doc, sheet);
        }

        let params = self.ctx.parameters().clone();
        for block in &sheet.blocks {
            self.process_block(doc, &sheet.name, block, &params)?;
        }
        Ok(())
    }

    /// Clones the sheet once per distinct value of its param label, in
    /// first-occurrence order, and processes each clone with that value
    /// added to the parameters. The template sheet is removed afterwards.
    fn process_dynamic_sheet(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &SheetDefinition,
    ) -> Result<(), ReportError> {
        let view_name = sheet.data_view.as_deref().unwrap_or_default();
        let label = sheet.param_label.as_deref().unwrap_or_default();

        let view = self.ctx.resolve_view(view_name)?;
        let column = view
            .column_for(label)
            .ok_or_else(|| ReportError::UnknownParamLabel {
                view: view_name.to_string(),
                label: label.to_string(),
            })?
            .to_string();

        let mut seen = HashSet::new();
        let values: Vec<String> = view
            .rows()
            .iter()
            .filter_map(|row| row.get(&column))
            .map(|value| value.display_string())
            .filter(|value| seen.insert(value.clone()))
            .collect();
        info!(
            "Dynamic sheet '{}': {} sheet(s) from '{}'",
            sheet.name,
            values.len(),
            label
        );

        for value in &values {
            if value.is_empty() {
                warn!("Dynamic sheet '{}' has an empty '{}' value", sheet.name, label);
            }
            doc.copy_sheet(&sheet.name, value)?;

            let mut params = self.ctx.parameters().clone();
            params.insert(label.to_string(), value.clone());
            for block in &sheet.blocks {
                self.process_block(doc, value, block, &params)?;
            }
        }

        if !values.is_empty() {
            doc.delete_sheet(&sheet.name)?;
        }
        Ok(())
    }

    pub fn process_block(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        block: &BlockDefinition,
        params: &HashMap<String, String>,
    ) -> Result<(), ReportError> {
        debug!("Processing block '{}' ({}) on '{}'", block.name, block.kind, sheet);
        let result = match &block.kind {
            BlockKind::Value | BlockKind::Header => {
                self.process_value_block(doc, sheet, block, params)
            }
            BlockKind::Matrix => self.process_matrix_block(doc, sheet, block, params),
            BlockKind::Other(kind) => Err(ReportError::UnsupportedBlockType {
                block: block.name.clone(),
                kind: kind.clone(),
            }),
        };
        result.map_err(|e| e.in_block(&block.name))
    }

    fn process_value_block(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        block: &BlockDefinition,
        params: &HashMap<String, String>,
    ) -> Result<(), ReportError> {
        let data = self.ctx.resolve_block_data(block, params)?;
        if data.is_empty() {
            return Ok(());
        }

        let range = block.parsed_range()?;
        expand(doc, sheet, Axis::of(block), &range, data.len())?;
        self.fill_block_data(doc, sheet, block, &data)
    }

    /// Stamps the block once per row along its direction. Room for the
    /// rows must already have been inserted.
    fn fill_block_data(
        &self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        block: &BlockDefinition,
        data: &[DataRow],
    ) -> Result<(), ReportError> {
        let range = block.parsed_range()?;
        let cache = TemplateCache::capture(&*doc, sheet, range)?;
        let axis = Axis::of(block);
        let view = self.block_view(block);
        let origin = cache.origin();

        for (i, row) in data.iter().enumerate() {
            let (dr, dc) = axis.step(&range, i as u32);
            let bindings = bind_row(view.as_deref(), row);
            cache.stamp(doc, sheet, (origin.0 + dr, origin.1 + dc), Some(&bindings))?;
        }
        Ok(())
    }

    fn process_matrix_block(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        block: &BlockDefinition,
        params: &HashMap<String, String>,
    ) -> Result<(), ReportError> {
        let v_axis = block
            .sub_blocks
            .iter()
            .find(|b| b.is_axis() && !b.is_horizontal());
        let h_axis = block
            .sub_blocks
            .iter()
            .find(|b| b.is_axis() && b.is_horizontal());
        let (v_axis, h_axis) = match (v_axis, h_axis) {
            (Some(v), Some(h)) => (v, h),
            _ => return Err(ReportError::MissingAxis(block.name.clone())),
        };
        let v_range = v_axis.parsed_range()?;
        let h_range = h_axis.parsed_range()?;

        // The primary axis is expanded first; its lines are copied last so
        // they pick up the secondary axis' new lines.
        let vertical_first = v_axis.insert_after;
        let (primary, secondary) = if vertical_first {
            (v_axis, h_axis)
        } else {
            (h_axis, v_axis)
        };
        let (primary_data, primary_added) = self.expand_axis(doc, sheet, primary, params)?;
        let (secondary_data, secondary_added) = self.expand_axis(doc, sheet, secondary, params)?;
        copy_template_slice(doc, sheet, block, secondary, primary, secondary_added)?;
        copy_template_slice(doc, sheet, block, primary, secondary, primary_added)?;

        let (v_data, h_data) = if vertical_first {
            (primary_data, secondary_data)
        } else {
            (secondary_data, primary_data)
        };
        self.fill_block_data(doc, sheet, v_axis, &v_data)?;
        self.fill_block_data(doc, sheet, h_axis, &h_data)?;

        let mut templates = Vec::new();
        for sub in block
            .sub_blocks
            .iter()
            .filter(|b| b.template || b.kind != BlockKind::Header)
        {
            templates.push((sub, TemplateCache::capture(&*doc, sheet, sub.parsed_range()?)?));
        }

        let v_key = self.axis_param_key(v_axis)?;
        let h_key = self.axis_param_key(h_axis)?;
        let v_column = self.axis_column(v_axis, &v_key);
        let h_column = self.axis_column(h_axis, &h_key);
        let v_step = v_range.height();
        let h_step = h_range.width();
        debug!(
            "Matrix '{}': {} x {} cell(s), keys {} / {}",
            block.name,
            v_data.len(),
            h_data.len(),
            v_key,
            h_key
        );

        for (r, row_item) in v_data.iter().enumerate() {
            for (c, col_item) in h_data.iter().enumerate() {
                let mut cell_params = params.clone();
                if let Some(value) = v_column.as_deref().and_then(|col| row_item.get(col)) {
                    cell_params.insert(v_key.clone(), value.display_string());
                }
                if let Some(value) = h_column.as_deref().and_then(|col| col_item.get(col)) {
                    cell_params.insert(h_key.clone(), value.display_string());
                }

                let offset = (r as u32 * v_step, c as u32 * h_step);
                for (template, cache) in &templates {
                    let data = self.ctx.resolve_block_data(template, &cell_params)?;
                    let view = self.block_view(template);
                    let bindings = data.first().map(|row| bind_row(view.as_deref(), row));
                    let origin = cache.origin();
                    cache.stamp(
                        doc,
                        sheet,
                        (origin.0 + offset.0, origin.1 + offset.1),
                        bindings.as_ref(),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Resolves an axis' data and inserts the lines its values need.
    fn expand_axis(
        &mut self,
        doc: &mut dyn SheetDocument,
        sheet: &str,
        axis_block: &BlockDefinition,
        params: &HashMap<String, String>,
    ) -> Result<(Vec<DataRow>, u32), ReportError> {
        let data = self.ctx.resolve_block_data(axis_block, params)?;
        let range = axis_block.parsed_range()?;
        let added = expand(doc, sheet, Axis::of(axis_block), &range, data.len())?;
        Ok((data, added))
    }

    /// Parameter key an axis contributes to each cell: its label variable,
    /// else the first label of its view.
    fn axis_param_key(&self, axis: &BlockDefinition) -> Result<String, ReportError> {
        if let Some(key) = axis.label_variable() {
            return Ok(key.to_string());
        }
        let view_name = axis
            .data_view_name()
            .ok_or_else(|| ReportError::MissingAxisKey(axis.name.clone()))?;
        let view = self
            .ctx
            .provider()
            .data_view(view_name)
            .ok_or_else(|| ReportError::UnknownView(view_name.to_string()))?;
        view.first_label()
            .map(str::to_string)
            .ok_or_else(|| ReportError::MissingAxisKey(axis.name.clone()))
    }

    fn axis_column(&self, axis: &BlockDefinition, key: &str) -> Option<String> {
        self.block_view(axis)?.column_for(key).map(str::to_string)
    }

    fn block_view(&self, block: &BlockDefinition) -> Option<Arc<DataViewDefinition>> {
        block
            .data_view_name()
            .and_then(|name| self.ctx.provider().data_view(name))
    }
}
