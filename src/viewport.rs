// ============================================================================
// VIEWPORT: pixel ↔ cell coordinate mapping
// ============================================================================
//
// All positions are in logical pixels relative to the top-left corner of the
// drawing surface.  Device pixel ratio is applied by the surface, never here.

use crate::canvas::CellId;

/// The part of the render configuration that decides where cells land.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Edge length of one cell in logical pixels (`base size × zoom`).
    pub cell_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// A cell's rectangle in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, cell_size: f32) -> Self {
        Self { width, height, cell_size, offset_x: 0.0, offset_y: 0.0 }
    }

    pub fn contains(&self, cell: CellId) -> bool {
        cell.x < self.width && cell.y < self.height
    }
}

/// Resolve a pixel position to the cell under it.
///
/// Returns `None` when the point is outside the grid's drawable area, which
/// is also how a pointer that is still over the surface but past the last
/// cell (fractional sizing) reads as "left the grid".
pub fn cell_at(pixel_x: f32, pixel_y: f32, viewport: &Viewport) -> Option<CellId> {
    let rel_x = pixel_x - viewport.offset_x;
    let rel_y = pixel_y - viewport.offset_y;
    // Negated comparison so NaN is rejected too
    if !(rel_x >= 0.0 && rel_y >= 0.0) || !(viewport.cell_size > 0.0) {
        return None;
    }

    let grid_x = (rel_x / viewport.cell_size).floor();
    let grid_y = (rel_y / viewport.cell_size).floor();
    if grid_x >= viewport.width as f32 || grid_y >= viewport.height as f32 {
        return None;
    }

    Some(CellId::new(grid_x as u32, grid_y as u32))
}

/// Top-left pixel of a cell.
pub fn pixel_origin(cell: CellId, viewport: &Viewport) -> (f32, f32) {
    (
        viewport.offset_x + cell.x as f32 * viewport.cell_size,
        viewport.offset_y + cell.y as f32 * viewport.cell_size,
    )
}

pub fn rect_of(cell: CellId, viewport: &Viewport) -> CellRect {
    let (x, y) = pixel_origin(cell, viewport);
    CellRect {
        x,
        y,
        width: viewport.cell_size,
        height: viewport.cell_size,
    }
}

/// Every cell in the rectangle spanned by `a` and `b`, clamped to the grid,
/// row-major.
pub fn cells_in_range(a: CellId, b: CellId, grid_width: u32, grid_height: u32) -> Vec<CellId> {
    if grid_width == 0 || grid_height == 0 {
        return Vec::new();
    }
    let min_x = a.x.min(b.x);
    let max_x = a.x.max(b.x).min(grid_width - 1);
    let min_y = a.y.min(b.y);
    let max_y = a.y.max(b.y).min(grid_height - 1);

    let mut cells = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            cells.push(CellId::new(x, y));
        }
    }
    cells
}

/// Drawable extent of the grid in logical pixels.
pub fn canvas_size(viewport: &Viewport) -> (f32, f32) {
    (
        viewport.width as f32 * viewport.cell_size,
        viewport.height as f32 * viewport.cell_size,
    )
}
