//! FILENAME: core/persistence/src/xlsx_styles.rs
//! PURPOSE: Reads the formatting parts of an XLSX package that calamine skips.
//! CONTEXT: calamine gives us values and merged regions only. Templates also
//! carry fonts, fills, borders, number formats, column widths and row
//! heights, and those must survive into the generated report. This module
//! opens the package as a zip archive and streams the relevant XML parts
//! with quick-xml.

use crate::PersistenceError;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use sheet::{parse_cell_ref, BorderLineStyle, BorderStyle, CellStyle, Color, NumberFormat};
use sheet::{TextAlign, VerticalAlign};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

/// Excel's default maximum digit width for Calibri 11, in pixels.
const MAX_DIGIT_WIDTH_PX: f64 = 7.0;

/// Formatting of one worksheet, as stored in its XML part.
#[derive(Debug, Default)]
pub(crate) struct SheetLayout {
    /// Cell style ids (the `s` attribute) of every styled cell.
    pub cell_xf: HashMap<(u32, u32), usize>,
    /// Column widths in pixels.
    pub column_widths: HashMap<u32, f64>,
    /// Row heights in points.
    pub row_heights: HashMap<u32, f64>,
}

/// An opened XLSX package.
pub(crate) struct XlsxPackage {
    archive: ZipArchive<BufReader<File>>,
    /// Sheet name -> worksheet part path inside the archive.
    sheet_parts: HashMap<String, String>,
}

impl XlsxPackage {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        let mut package = XlsxPackage {
            archive,
            sheet_parts: HashMap::new(),
        };
        package.sheet_parts = package.resolve_sheet_parts()?;
        Ok(package)
    }

    fn read_part(&mut self, name: &str) -> Result<Option<String>, PersistenceError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    /// Maps sheet names to worksheet part paths via workbook.xml and its rels.
    fn resolve_sheet_parts(&mut self) -> Result<HashMap<String, String>, PersistenceError> {
        let workbook_xml = self
            .read_part("xl/workbook.xml")?
            .ok_or_else(|| PersistenceError::InvalidFormat("missing xl/workbook.xml".to_string()))?;
        let rels_xml = self.read_part("xl/_rels/workbook.xml.rels")?.unwrap_or_default();

        let mut targets: HashMap<String, String> = HashMap::new();
        for_each_element(&rels_xml, |e| {
            if e.local_name().as_ref() == b"Relationship" {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    targets.insert(id, target);
                }
            }
        })?;

        let mut parts = HashMap::new();
        for_each_element(&workbook_xml, |e| {
            if e.local_name().as_ref() == b"sheet" {
                // r:id, matched on local name
                if let (Some(name), Some(id)) = (attr(e, b"name"), attr(e, b"id")) {
                    if let Some(target) = targets.get(&id) {
                        parts.insert(name, part_path(target));
                    }
                }
            }
        })?;
        Ok(parts)
    }

    /// Parses xl/styles.xml into one `CellStyle` per cellXfs entry.
    pub fn cell_styles(&mut self) -> Result<Vec<CellStyle>, PersistenceError> {
        match self.read_part("xl/styles.xml")? {
            Some(xml) => parse_styles(&xml),
            None => Ok(Vec::new()),
        }
    }

    pub fn sheet_layout(&mut self, sheet_name: &str) -> Result<SheetLayout, PersistenceError> {
        let Some(part) = self.sheet_parts.get(sheet_name).cloned() else {
            return Ok(SheetLayout::default());
        };
        match self.read_part(&part)? {
            Some(xml) => parse_sheet_layout(&xml),
            None => Ok(SheetLayout::default()),
        }
    }
}

fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

// ============================================================================
// XML HELPERS
// ============================================================================

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            unescape(&raw).ok().map(|v| v.into_owned())
        })
}

/// `<b/>`, `<b val="1"/>` and `<b val="true"/>` are on; `val="0"` is off.
fn flag(e: &BytesStart) -> bool {
    match attr(e, b"val") {
        Some(v) => v != "0" && v != "false",
        None => true,
    }
}

fn rgb(e: &BytesStart) -> Option<Color> {
    attr(e, b"rgb").and_then(|hex| Color::from_hex(&hex))
}

/// Calls `visit` for every start and empty element of a document.
fn for_each_element<F>(xml: &str, mut visit: F) -> Result<(), PersistenceError>
where
    F: FnMut(&BytesStart),
{
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => visit(&e),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

// ============================================================================
// STYLES.XML
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
}

#[derive(Debug, Default, Clone)]
struct Xf {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    align: TextAlign,
    valign: VerticalAlign,
    wrap_text: bool,
    rotation: i16,
    indent: u8,
}

#[derive(Debug, Default)]
struct StyleParts {
    num_fmts: HashMap<u32, String>,
    fonts: Vec<sheet::FontStyle>,
    fills: Vec<Option<Color>>,
    borders: Vec<sheet::Borders>,
    xfs: Vec<Xf>,
}

/// Which edge of a `<border>` the parser is inside.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

fn parse_styles(xml: &str) -> Result<Vec<CellStyle>, PersistenceError> {
    let mut parts = StyleParts::default();
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut section = Section::None;
    let mut font = sheet::FontStyle::default();
    let mut fill: Option<Color> = None;
    let mut solid_fill = false;
    let mut borders = sheet::Borders::default();
    let mut edge: Option<Edge> = None;
    let mut xf = Xf::default();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                match (section, name.as_ref()) {
                    (_, b"numFmts") => section = Section::NumFmts,
                    (_, b"fonts") => section = Section::Fonts,
                    (_, b"fills") => section = Section::Fills,
                    (_, b"borders") => section = Section::Borders,
                    (_, b"cellXfs") => section = Section::CellXfs,
                    (_, b"cellStyleXfs") | (_, b"cellStyles") | (_, b"dxfs") => {
                        section = Section::None
                    }

                    (Section::NumFmts, b"numFmt") => {
                        let id = attr(&e, b"numFmtId").and_then(|v| v.parse().ok());
                        if let (Some(id), Some(code)) = (id, attr(&e, b"formatCode")) {
                            parts.num_fmts.insert(id, code);
                        }
                    }

                    (Section::Fonts, b"font") => {
                        font = sheet::FontStyle::default();
                        if is_empty {
                            parts.fonts.push(font.clone());
                        }
                    }
                    (Section::Fonts, b"b") => font.bold = flag(&e),
                    (Section::Fonts, b"i") => font.italic = flag(&e),
                    (Section::Fonts, b"strike") => font.strikethrough = flag(&e),
                    (Section::Fonts, b"u") => {
                        font.underline = attr(&e, b"val").map_or(true, |v| v != "none")
                    }
                    (Section::Fonts, b"sz") => {
                        if let Some(size) = attr(&e, b"val").and_then(|v| v.parse::<f64>().ok()) {
                            font.size = size.round().clamp(1.0, 409.0) as u8;
                        }
                    }
                    (Section::Fonts, b"name") => {
                        if let Some(family) = attr(&e, b"val") {
                            font.family = family;
                        }
                    }
                    (Section::Fonts, b"color") => font.color = rgb(&e),

                    (Section::Fills, b"fill") => {
                        fill = None;
                        solid_fill = false;
                        if is_empty {
                            parts.fills.push(None);
                        }
                    }
                    (Section::Fills, b"patternFill") => {
                        solid_fill = attr(&e, b"patternType").as_deref() == Some("solid");
                    }
                    (Section::Fills, b"fgColor") => {
                        if solid_fill {
                            fill = rgb(&e);
                        }
                    }

                    (Section::Borders, b"border") => {
                        borders = sheet::Borders::default();
                        if is_empty {
                            parts.borders.push(borders.clone());
                        }
                    }
                    (Section::Borders, b"left") | (Section::Borders, b"start") => {
                        edge = Some(Edge::Left);
                        set_edge(&mut borders, Edge::Left, &e);
                    }
                    (Section::Borders, b"right") | (Section::Borders, b"end") => {
                        edge = Some(Edge::Right);
                        set_edge(&mut borders, Edge::Right, &e);
                    }
                    (Section::Borders, b"top") => {
                        edge = Some(Edge::Top);
                        set_edge(&mut borders, Edge::Top, &e);
                    }
                    (Section::Borders, b"bottom") => {
                        edge = Some(Edge::Bottom);
                        set_edge(&mut borders, Edge::Bottom, &e);
                    }
                    (Section::Borders, b"diagonal") => edge = None,
                    (Section::Borders, b"color") => {
                        if let Some(current) = edge {
                            edge_mut(&mut borders, current).color = rgb(&e);
                        }
                    }

                    (Section::CellXfs, b"xf") => {
                        xf = Xf {
                            num_fmt_id: attr(&e, b"numFmtId").and_then(|v| v.parse().ok()).unwrap_or(0),
                            font_id: attr(&e, b"fontId").and_then(|v| v.parse().ok()).unwrap_or(0),
                            fill_id: attr(&e, b"fillId").and_then(|v| v.parse().ok()).unwrap_or(0),
                            border_id: attr(&e, b"borderId").and_then(|v| v.parse().ok()).unwrap_or(0),
                            ..Xf::default()
                        };
                        if is_empty {
                            parts.xfs.push(xf.clone());
                        }
                    }
                    (Section::CellXfs, b"alignment") => {
                        xf.align = match attr(&e, b"horizontal").as_deref() {
                            Some("left") => TextAlign::Left,
                            Some("center") | Some("centerContinuous") => TextAlign::Center,
                            Some("right") => TextAlign::Right,
                            _ => TextAlign::General,
                        };
                        xf.valign = match attr(&e, b"vertical").as_deref() {
                            Some("top") => VerticalAlign::Top,
                            Some("center") => VerticalAlign::Middle,
                            _ => VerticalAlign::Bottom,
                        };
                        xf.wrap_text = attr(&e, b"wrapText").map_or(false, |v| v == "1" || v == "true");
                        xf.rotation = attr(&e, b"textRotation").and_then(|v| v.parse().ok()).unwrap_or(0);
                        xf.indent = attr(&e, b"indent").and_then(|v| v.parse().ok()).unwrap_or(0);
                    }
                    _ => {}
                }
            }
            Event::End(e) => match (section, e.local_name().as_ref()) {
                (Section::Fonts, b"font") => parts.fonts.push(font.clone()),
                (Section::Fills, b"fill") => parts.fills.push(fill),
                (Section::Borders, b"border") => parts.borders.push(borders.clone()),
                (Section::Borders, b"left" | b"right" | b"top" | b"bottom" | b"start" | b"end") => {
                    edge = None
                }
                (Section::CellXfs, b"xf") => parts.xfs.push(xf.clone()),
                (_, b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs") => {
                    section = Section::None
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parts.xfs.iter().map(|xf| build_style(&parts, xf)).collect())
}

fn edge_mut(borders: &mut sheet::Borders, edge: Edge) -> &mut BorderStyle {
    match edge {
        Edge::Left => &mut borders.left,
        Edge::Right => &mut borders.right,
        Edge::Top => &mut borders.top,
        Edge::Bottom => &mut borders.bottom,
    }
}

fn set_edge(borders: &mut sheet::Borders, edge: Edge, e: &BytesStart) {
    let line = attr(e, b"style").map_or(BorderLineStyle::None, |s| BorderLineStyle::from_xml(&s));
    edge_mut(borders, edge).style = line;
}

fn build_style(parts: &StyleParts, xf: &Xf) -> CellStyle {
    let number_format = match xf.num_fmt_id {
        0 => NumberFormat::General,
        id => match parts.num_fmts.get(&id) {
            Some(code) => NumberFormat::Custom(code.clone()),
            None if id <= u8::MAX as u32 => NumberFormat::BuiltIn(id as u8),
            None => NumberFormat::General,
        },
    };

    CellStyle {
        font: parts.fonts.get(xf.font_id).cloned().unwrap_or_default(),
        background: parts.fills.get(xf.fill_id).copied().flatten(),
        text_align: xf.align,
        vertical_align: xf.valign,
        number_format,
        borders: parts.borders.get(xf.border_id).cloned().unwrap_or_default(),
        wrap_text: xf.wrap_text,
        text_rotation: xf.rotation,
        indent: xf.indent,
    }
}

// ============================================================================
// WORKSHEET XML
// ============================================================================

fn parse_sheet_layout(xml: &str) -> Result<SheetLayout, PersistenceError> {
    let mut layout = SheetLayout::default();

    for_each_element(xml, |e| match e.local_name().as_ref() {
        b"col" => {
            let min = attr(e, b"min").and_then(|v| v.parse::<u32>().ok());
            let max = attr(e, b"max").and_then(|v| v.parse::<u32>().ok());
            let width = attr(e, b"width").and_then(|v| v.parse::<f64>().ok());
            if let (Some(min), Some(max), Some(width)) = (min, max, width) {
                let pixels = (width * MAX_DIGIT_WIDTH_PX).round();
                for col in min.max(1)..=max.min(sheet::coord::MAX_COL + 1) {
                    layout.column_widths.insert(col - 1, pixels);
                }
            }
        }
        b"row" => {
            let row = attr(e, b"r").and_then(|v| v.parse::<u32>().ok());
            let height = attr(e, b"ht").and_then(|v| v.parse::<f64>().ok());
            if let (Some(row), Some(height)) = (row, height) {
                if row > 0 {
                    layout.row_heights.insert(row - 1, height);
                }
            }
        }
        b"c" => {
            let style = attr(e, b"s").and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            if style > 0 {
                if let Some(coord) = attr(e, b"r").and_then(|r| parse_cell_ref(&r)) {
                    layout.cell_xf.insert(coord, style);
                }
            }
        }
        _ => {}
    })?;

    Ok(layout)
}
