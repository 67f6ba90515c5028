//! FILENAME: core/sheet/src/grid.rs
//! PURPOSE: Manages the collection of cells (The Spreadsheet Grid).
//! CONTEXT: This file defines the `Grid` struct which acts as the container
//! for all cell data and merged regions of one sheet. It uses a sparse
//! storage strategy (HashMap) so that large, mostly empty report sheets
//! stay cheap to copy and expand.

use std::collections::HashMap;

use crate::cell::Cell;
use crate::coord::{CellCoord, CellRange};

/// The Grid struct holds the state of the spreadsheet data.
/// It uses a sparse representation (HashMap) mapping coordinates to Cells.
/// Row and Col are 0-based indices.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    /// Sparse storage: keys are (row, col), values are Cell instances.
    pub cells: HashMap<(u32, u32), Cell>,

    /// Tracks the highest row index currently in use.
    pub max_row: u32,

    /// Tracks the highest column index currently in use.
    pub max_col: u32,

    /// Merged regions. Never overlapping.
    merged: Vec<CellRange>,
}

impl Grid {
    /// Creates a new, empty Grid.
    pub fn new() -> Self {
        Grid {
            cells: HashMap::new(),
            max_row: 0,
            max_col: 0,
            merged: Vec::new(),
        }
    }

    /// Sets a cell at the specified coordinates.
    /// Updates max_row/max_col boundaries automatically.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) {
        if row > self.max_row {
            self.max_row = row;
        }
        if col > self.max_col {
            self.max_col = col;
        }
        self.cells.insert((row, col), cell);
    }

    /// Retrieves a reference to a cell at the specified coordinates.
    /// Returns None if the cell is empty (not stored).
    pub fn get_cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Removes a cell from the grid (clearing it).
    /// If the cell was at a boundary (max_row or max_col), recalculates bounds.
    pub fn clear_cell(&mut self, row: u32, col: u32) {
        let was_at_boundary = row == self.max_row || col == self.max_col;
        self.cells.remove(&(row, col));

        if was_at_boundary {
            self.recalculate_bounds();
        }
    }

    /// Recalculates max_row and max_col by scanning all cells.
    /// This is O(n) where n is the number of non-empty cells.
    pub fn recalculate_bounds(&mut self) {
        if self.cells.is_empty() {
            self.max_row = 0;
            self.max_col = 0;
            return;
        }

        let mut new_max_row = 0u32;
        let mut new_max_col = 0u32;

        for &(row, col) in self.cells.keys() {
            if row > new_max_row {
                new_max_row = row;
            }
            if col > new_max_col {
                new_max_col = col;
            }
        }

        self.max_row = new_max_row;
        self.max_col = new_max_col;
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.merged.is_empty()
    }

    /// Returns the used area as a range anchored at A1, or None for an
    /// empty grid. Merged regions count as used.
    pub fn dimension(&self) -> Option<CellRange> {
        if self.is_empty() {
            return None;
        }
        let mut end_row = self.max_row;
        let mut end_col = self.max_col;
        for region in &self.merged {
            end_row = end_row.max(region.end_row);
            end_col = end_col.max(region.end_col);
        }
        Some(CellRange::new((0, 0), (end_row, end_col)))
    }

    /// Stored cells inside `range`, sorted in reading order.
    pub fn cells_in_range(&self, range: &CellRange) -> Vec<(CellCoord, &Cell)> {
        let mut found: Vec<(CellCoord, &Cell)> = self
            .cells
            .iter()
            .filter(|(pos, _)| range.contains(**pos))
            .map(|(pos, cell)| (*pos, cell))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        found
    }

    // ========================================================================
    // STRUCTURE
    // ========================================================================

    /// Inserts `count` empty rows before row `at`.
    /// Cells at or below `at` move down. Merged regions starting at or below
    /// `at` move down; regions straddling `at` grow.
    pub fn insert_rows(&mut self, at: u32, count: u32) {
        if count == 0 {
            return;
        }

        // Collect cells that need to move, highest row first so that no
        // moved cell lands on a key that has not been moved yet.
        let mut to_move: Vec<(u32, u32)> = self
            .cells
            .keys()
            .filter(|(r, _)| *r >= at)
            .copied()
            .collect();
        to_move.sort_by(|a, b| b.0.cmp(&a.0));

        for (r, c) in to_move {
            if let Some(cell) = self.cells.remove(&(r, c)) {
                self.cells.insert((r + count, c), cell);
            }
        }

        for region in &mut self.merged {
            if region.start_row >= at {
                region.start_row += count;
                region.end_row += count;
            } else if region.end_row >= at {
                region.end_row += count;
            }
        }

        self.recalculate_bounds();
    }

    /// Inserts `count` empty columns before column `at`.
    /// Mirrors `insert_rows` on the other axis.
    pub fn insert_cols(&mut self, at: u32, count: u32) {
        if count == 0 {
            return;
        }

        let mut to_move: Vec<(u32, u32)> = self
            .cells
            .keys()
            .filter(|(_, c)| *c >= at)
            .copied()
            .collect();
        to_move.sort_by(|a, b| b.1.cmp(&a.1));

        for (r, c) in to_move {
            if let Some(cell) = self.cells.remove(&(r, c)) {
                self.cells.insert((r, c + count), cell);
            }
        }

        for region in &mut self.merged {
            if region.start_col >= at {
                region.start_col += count;
                region.end_col += count;
            } else if region.end_col >= at {
                region.end_col += count;
            }
        }

        self.recalculate_bounds();
    }

    // ========================================================================
    // MERGES
    // ========================================================================

    /// Merges `range`. Existing regions overlapping it are replaced.
    /// Merging a region that already exists is a no-op, and a single-cell
    /// range is ignored.
    pub fn merge(&mut self, range: CellRange) {
        if range.is_single_cell() || self.merged.contains(&range) {
            return;
        }
        self.merged.retain(|existing| !existing.overlaps(&range));
        self.merged.push(range);
    }

    /// Removes a merged region if present.
    pub fn unmerge(&mut self, range: &CellRange) -> bool {
        let before = self.merged.len();
        self.merged.retain(|existing| existing != range);
        self.merged.len() != before
    }

    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged
    }

    /// The merged region containing `coord`, if any.
    pub fn merged_region_at(&self, coord: CellCoord) -> Option<&CellRange> {
        self.merged.iter().find(|region| region.contains(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    fn range(s: &str) -> CellRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_set_and_clear_bounds() {
        let mut grid = Grid::new();
        grid.set_cell(4, 2, Cell::new_number(1.0));
        grid.set_cell(1, 1, Cell::new_number(2.0));
        assert_eq!((grid.max_row, grid.max_col), (4, 2));

        grid.clear_cell(4, 2);
        assert_eq!((grid.max_row, grid.max_col), (1, 1));
    }

    #[test]
    fn test_dimension() {
        let mut grid = Grid::new();
        assert_eq!(grid.dimension(), None);

        grid.set_cell(2, 3, Cell::new_text("x"));
        assert_eq!(grid.dimension().unwrap().to_a1(), "A1:D3");

        grid.merge(range("E1:F5"));
        assert_eq!(grid.dimension().unwrap().to_a1(), "A1:F5");
    }

    #[test]
    fn test_insert_rows_shifts_cells() {
        let mut grid = Grid::new();
        grid.set_cell(0, 0, Cell::new_text("head"));
        grid.set_cell(1, 0, Cell::new_text("a"));
        grid.set_cell(2, 0, Cell::new_text("b"));

        grid.insert_rows(1, 2);

        assert_eq!(grid.get_cell(0, 0).unwrap().value, CellValue::from("head"));
        assert!(grid.get_cell(1, 0).is_none());
        assert!(grid.get_cell(2, 0).is_none());
        assert_eq!(grid.get_cell(3, 0).unwrap().value, CellValue::from("a"));
        assert_eq!(grid.get_cell(4, 0).unwrap().value, CellValue::from("b"));
        assert_eq!(grid.max_row, 4);
    }

    #[test]
    fn test_insert_rows_adjusts_merges() {
        let mut grid = Grid::new();
        grid.merge(range("A1:A3")); // straddles row index 1
        grid.merge(range("B4:C4")); // below the insertion point

        grid.insert_rows(1, 2);

        let regions = grid.merged_regions();
        assert!(regions.contains(&range("A1:A5")));
        assert!(regions.contains(&range("B6:C6")));
    }

    #[test]
    fn test_insert_cols_shifts_cells_and_merges() {
        let mut grid = Grid::new();
        grid.set_cell(0, 0, Cell::new_text("a"));
        grid.set_cell(0, 1, Cell::new_text("b"));
        grid.merge(range("B2:C2"));

        grid.insert_cols(1, 1);

        assert_eq!(grid.get_cell(0, 0).unwrap().value, CellValue::from("a"));
        assert!(grid.get_cell(0, 1).is_none());
        assert_eq!(grid.get_cell(0, 2).unwrap().value, CellValue::from("b"));
        assert!(grid.merged_regions().contains(&range("C2:D2")));
    }

    #[test]
    fn test_merge_replaces_overlaps() {
        let mut grid = Grid::new();
        grid.merge(range("A1:B2"));
        grid.merge(range("A1:B2"));
        assert_eq!(grid.merged_regions().len(), 1);

        grid.merge(range("B2:C3"));
        assert_eq!(grid.merged_regions(), &[range("B2:C3")]);

        grid.merge(range("D4:D4"));
        assert_eq!(grid.merged_regions().len(), 1);
        assert_eq!(grid.merged_region_at((2, 2)), Some(&range("B2:C3")));
        assert!(grid.unmerge(&range("B2:C3")));
        assert!(grid.merged_regions().is_empty());
    }

    #[test]
    fn test_cells_in_range_reading_order() {
        let mut grid = Grid::new();
        grid.set_cell(1, 1, Cell::new_number(4.0));
        grid.set_cell(0, 1, Cell::new_number(2.0));
        grid.set_cell(0, 0, Cell::new_number(1.0));
        grid.set_cell(5, 5, Cell::new_number(9.0));

        let found = grid.cells_in_range(&range("A1:B2"));
        let coords: Vec<CellCoord> = found.iter().map(|(pos, _)| *pos).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 1)]);
    }
}
