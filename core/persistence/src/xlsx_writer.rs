//! FILENAME: core/persistence/src/xlsx_writer.rs

use crate::{PersistenceError, Workbook};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, FormatUnderline, Workbook as XlsxWorkbook};
use sheet::{BorderLineStyle, CellStyle, CellValue, Color, NumberFormat, TextAlign, VerticalAlign};
use std::path::Path;

pub fn save_xlsx(workbook: &Workbook, path: &Path) -> Result<(), PersistenceError> {
    let mut xlsx = XlsxWorkbook::new();

    // One Format per registry entry; index 0 (default) writes unformatted.
    let formats: Vec<Option<Format>> = workbook
        .styles
        .all_styles()
        .iter()
        .enumerate()
        .map(|(i, style)| (i > 0).then(|| convert_style_to_format(style)))
        .collect();
    let default_format = Format::new();
    let format_for = |index: usize| formats.get(index).and_then(|f| f.as_ref());

    for (sheet_index, sheet) in workbook.sheets.iter().enumerate() {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        if sheet_index == workbook.active_sheet {
            worksheet.set_active(true);
        }

        for (col, width) in &sheet.column_widths {
            worksheet.set_column_width_pixels(*col as u16, width.round().max(0.0) as u16)?;
        }

        // Excel uses points
        for (row, height) in &sheet.row_heights {
            worksheet.set_row_height(*row, *height)?;
        }

        // Merges first: merge_range fills the region with blanks, the
        // master cell's value is written below.
        for region in sheet.grid.merged_regions() {
            let format = sheet
                .grid
                .get_cell(region.start_row, region.start_col)
                .and_then(|c| format_for(c.style_index))
                .unwrap_or(&default_format);
            worksheet.merge_range(
                region.start_row,
                region.start_col as u16,
                region.end_row,
                region.end_col as u16,
                "",
                format,
            )?;
        }

        for ((row, col), cell) in &sheet.grid.cells {
            let (row, col) = (*row, *col as u16);
            let format = format_for(cell.style_index);

            match &cell.value {
                CellValue::Empty => {
                    if let Some(fmt) = format {
                        worksheet.write_blank(row, col, fmt)?;
                    }
                }
                CellValue::Number(n) => {
                    if let Some(fmt) = format {
                        worksheet.write_number_with_format(row, col, *n, fmt)?;
                    } else {
                        worksheet.write_number(row, col, *n)?;
                    }
                }
                CellValue::Text(s) => {
                    if let Some(fmt) = format {
                        worksheet.write_string_with_format(row, col, s, fmt)?;
                    } else {
                        worksheet.write_string(row, col, s)?;
                    }
                }
                CellValue::Boolean(b) => {
                    if let Some(fmt) = format {
                        worksheet.write_boolean_with_format(row, col, *b, fmt)?;
                    } else {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                }
                CellValue::Error(e) => {
                    if let Some(fmt) = format {
                        worksheet.write_string_with_format(row, col, e.as_str(), fmt)?;
                    } else {
                        worksheet.write_string(row, col, e.as_str())?;
                    }
                }
            }
        }
    }

    xlsx.save(path)?;
    Ok(())
}

fn convert_style_to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    // Font settings
    if style.font.bold {
        format = format.set_bold();
    }
    if style.font.italic {
        format = format.set_italic();
    }
    if style.font.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if style.font.strikethrough {
        format = format.set_font_strikethrough();
    }

    format = format.set_font_size(style.font.size as f64);
    format = format.set_font_name(&style.font.family);

    // Colors
    if let Some(color) = &style.font.color {
        format = format.set_font_color(color_to_xlsx(color));
    }
    if let Some(color) = &style.background {
        format = format.set_background_color(color_to_xlsx(color));
    }

    // Horizontal alignment
    format = format.set_align(match style.text_align {
        TextAlign::Left => FormatAlign::Left,
        TextAlign::Center => FormatAlign::Center,
        TextAlign::Right => FormatAlign::Right,
        TextAlign::General => FormatAlign::General,
    });

    // Vertical alignment (bottom is the Excel default)
    match style.vertical_align {
        VerticalAlign::Top => format = format.set_align(FormatAlign::Top),
        VerticalAlign::Middle => format = format.set_align(FormatAlign::VerticalCenter),
        VerticalAlign::Bottom => {}
    }

    if style.text_rotation != 0 {
        format = format.set_rotation(style.text_rotation);
    }
    if style.indent > 0 {
        format = format.set_indent(style.indent);
    }
    if style.wrap_text {
        format = format.set_text_wrap();
    }

    // Borders
    let edges = [
        (&style.borders.top, 0),
        (&style.borders.right, 1),
        (&style.borders.bottom, 2),
        (&style.borders.left, 3),
    ];
    for (edge, side) in edges {
        if edge.style == BorderLineStyle::None {
            continue;
        }
        let line = convert_border(edge.style);
        format = match side {
            0 => format.set_border_top(line),
            1 => format.set_border_right(line),
            2 => format.set_border_bottom(line),
            _ => format.set_border_left(line),
        };
        if let Some(color) = &edge.color {
            let color = color_to_xlsx(color);
            format = match side {
                0 => format.set_border_top_color(color),
                1 => format.set_border_right_color(color),
                2 => format.set_border_bottom_color(color),
                _ => format.set_border_left_color(color),
            };
        }
    }

    // Number format
    match &style.number_format {
        NumberFormat::General => {}
        NumberFormat::BuiltIn(id) => format = format.set_num_format_index(*id),
        NumberFormat::Custom(code) => format = format.set_num_format(code),
    }

    format
}

fn convert_border(line: BorderLineStyle) -> FormatBorder {
    match line {
        BorderLineStyle::None => FormatBorder::None,
        BorderLineStyle::Thin => FormatBorder::Thin,
        BorderLineStyle::Medium => FormatBorder::Medium,
        BorderLineStyle::Thick => FormatBorder::Thick,
        BorderLineStyle::Dashed => FormatBorder::Dashed,
        BorderLineStyle::Dotted => FormatBorder::Dotted,
        BorderLineStyle::Double => FormatBorder::Double,
        BorderLineStyle::Hair => FormatBorder::Hair,
    }
}

fn color_to_xlsx(color: &Color) -> rust_xlsxwriter::Color {
    rust_xlsxwriter::Color::RGB(color.to_rgb())
}
