//! FILENAME: core/sheet/src/lib.rs
//! PURPOSE: Main library entry point for the in-memory sheet model.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//! Cells, coordinates, ranges, the sparse grid and the style registry live
//! here; file formats live in `persistence`.

pub mod cell;
pub mod coord;
pub mod grid;
pub mod style;

// Re-export commonly used types at the crate root
pub use cell::{Cell, CellError, CellValue};
pub use coord::{
    a1_to_coord, col_to_index, coord_to_a1, index_to_col, parse_cell_ref, CellCoord, CellRange,
    RangeParseError,
};
pub use grid::Grid;
pub use style::{
    BorderLineStyle, BorderStyle, Borders, CellStyle, Color, FontStyle, NumberFormat,
    StyleRegistry, TextAlign, VerticalAlign,
};
