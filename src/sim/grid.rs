//! Uniform grid broad phase
//!
//! Cells are at least as wide as the largest marble, so two touching marbles
//! always sit in the same or adjacent cells and a 3x3 scan never misses a
//! contact. Cell count is capped per axis; a single huge marble still
//! inflates every cell and cost then drifts toward O(n²).

use glam::Vec2;

use super::marble::Marble;

/// Upper bound on grid columns and rows
pub const MAX_CELLS_PER_AXIS: usize = 256;

/// Reusable spatial grid over the field
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<usize>>,
    /// Cell of each marble from the last rebuild (None = outside the grid)
    marble_cells: Vec<Option<(usize, usize)>>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Bin every marble by `floor(pos / cell_size)`
    ///
    /// Returns false (and leaves the grid empty) when there is nothing to
    /// partition: no marbles, zero cell size or an empty field.
    pub fn rebuild(&mut self, marbles: &[Marble], width: f32, height: f32) -> bool {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.marble_cells.clear();

        let largest = marbles
            .iter()
            .map(|m| m.radius() * 2.0)
            .fold(0.0_f32, f32::max);
        if largest <= 0.0 || width <= 0.0 || height <= 0.0 {
            self.cell_size = 0.0;
            return false;
        }
        // tiny marbles on a large field would otherwise mean millions of cells
        let axis_cap = MAX_CELLS_PER_AXIS as f32;
        let cell_size = largest.max(width / axis_cap).max(height / axis_cap);

        let cols = ((width / cell_size).ceil().max(1.0) as usize).min(MAX_CELLS_PER_AXIS);
        let rows = ((height / cell_size).ceil().max(1.0) as usize).min(MAX_CELLS_PER_AXIS);
        self.cells.resize_with(cols * rows, Vec::new);
        self.cell_size = cell_size;
        self.cols = cols;
        self.rows = rows;

        for (i, marble) in marbles.iter().enumerate() {
            let cell = self.cell_of(marble.pos);
            if let Some((cx, cy)) = cell {
                self.cells[cy * cols + cx].push(i);
            }
            self.marble_cells.push(cell);
        }
        true
    }

    /// Grid cell containing `pos`, or None outside the grid
    pub fn cell_of(&self, pos: Vec2) -> Option<(usize, usize)> {
        if self.cell_size <= 0.0 {
            return None;
        }
        let cx = (pos.x / self.cell_size).floor();
        let cy = (pos.y / self.cell_size).floor();
        if cx < 0.0 || cy < 0.0 || cx >= self.cols as f32 || cy >= self.rows as f32 {
            return None;
        }
        Some((cx as usize, cy as usize))
    }

    /// Cell recorded for marble `index` at the last rebuild
    #[inline]
    pub fn marble_cell(&self, index: usize) -> Option<(usize, usize)> {
        self.marble_cells.get(index).copied().flatten()
    }

    /// Marble indices in the 3x3 block around a cell
    pub fn neighbors(&self, (cx, cy): (usize, usize)) -> impl Iterator<Item = usize> + '_ {
        let x_range = cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1);
        let y_range = cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1);
        y_range.flat_map(move |y| {
            x_range
                .clone()
                .flat_map(move |x| self.cells[y * self.cols + x].iter().copied())
        })
    }
}
