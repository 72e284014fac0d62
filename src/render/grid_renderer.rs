use std::sync::Arc;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::background::{BackgroundLoader, FileImageLoader, ImageLoader};
use super::surface::Surface;
use super::text;
use super::{Redraw, RenderConfig, RenderConfigUpdate, RenderError, ThemeColors};
use crate::canvas::{CellId, Grid, MarkedCells, SymmetryAxis};
use crate::palette::{BeadColor, Palette};
use crate::viewport::{self, CellRect};

/// Frosted beads render as a repeating 8×8 pattern of 4px squares.
const FROSTED_LIGHT: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const FROSTED_DARK: Rgba<u8> = Rgba([0xe0, 0xe0, 0xe0, 0xff]);
const FROSTED_SQUARE: f32 = 4.0;

/// Retained grid renderer.
///
/// Owns the pixel surface and the background-image loader.  Full redraws
/// happen on `render_full`; during a paint stroke the host calls
/// `render_cell` per touched cell instead.
pub struct GridRenderer {
    config: RenderConfig,
    surface: Surface,
    background: BackgroundLoader,
    /// Background stretched to the grid's device rect, keyed by that rect.
    scaled_background: Option<((u32, u32, u32, u32), RgbaImage)>,
    palette: Arc<Palette>,
    generation: u64,
}

impl GridRenderer {
    /// Renderer reading background images from the filesystem.
    pub fn configure(config: RenderConfig) -> Result<Self, RenderError> {
        Self::with_loader(config, Arc::new(FileImageLoader))
    }

    pub fn with_loader(
        config: RenderConfig,
        loader: Arc<dyn ImageLoader>,
    ) -> Result<Self, RenderError> {
        if !config.cell_size.is_finite() || config.cell_size <= 0.0 {
            return Err(RenderError::SurfaceUnavailable(format!(
                "invalid cell size {}",
                config.cell_size
            )));
        }
        let (w, h) = config.logical_size();
        let surface = Surface::new(w, h, config.device_pixel_ratio)?;

        let mut background = BackgroundLoader::new(loader);
        background.request(config.background_image.as_ref().map(|b| b.source.as_str()));

        let (dw, dh) = surface.device_size();
        crate::log_info!(
            "Renderer configured: {}x{} cells, {}px cells, surface {}x{}",
            config.width,
            config.height,
            config.cell_size,
            dw,
            dh
        );

        Ok(Self {
            config,
            surface,
            background,
            scaled_background: None,
            palette: Arc::new(Palette::default()),
            generation: 0,
        })
    }

    /// Palette used to look up cell labels.
    pub fn with_palette(mut self, palette: Arc<Palette>) -> Self {
        self.palette = palette;
        self
    }

    pub fn set_palette(&mut self, palette: Arc<Palette>) {
        self.palette = palette;
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn into_image(self) -> RgbaImage {
        self.surface.into_image()
    }

    /// Bumped by every draw call, so hosts know when to re-upload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn background_loading(&self) -> bool {
        self.background.is_loading()
    }

    /// Merge `update` into the config.  The surface is reallocated when its
    /// pixel extent changes; on failure the renderer keeps its old state.
    /// Returns how much redrawing the change needs.
    pub fn update_config(&mut self, update: RenderConfigUpdate) -> Result<Redraw, RenderError> {
        let next = self.config.merged(update);
        let redraw = self.config.redraw_needed(&next);

        if redraw == Redraw::Reallocate {
            if !next.cell_size.is_finite() || next.cell_size <= 0.0 {
                return Err(RenderError::SurfaceUnavailable(format!(
                    "invalid cell size {}",
                    next.cell_size
                )));
            }
            let (w, h) = next.logical_size();
            self.surface = Surface::new(w, h, next.device_pixel_ratio)?;
            self.scaled_background = None;
        } else if next.cell_size != self.config.cell_size
            || next.offset_x != self.config.offset_x
            || next.offset_y != self.config.offset_y
        {
            self.scaled_background = None;
        }

        let next_source = next.background_image.as_ref().map(|b| b.source.as_str());
        if next_source != self.background.source() {
            self.background.request(next_source);
            self.scaled_background = None;
        }

        self.config = next;
        Ok(redraw)
    }

    /// Apply a finished background load; redraws and returns `true` if the
    /// background changed.
    pub fn poll_background(&mut self, grid: &Grid) -> bool {
        if !self.background.poll() {
            return false;
        }
        self.scaled_background = None;
        self.render_full(grid);
        true
    }

    /// Headless variant of [`GridRenderer::poll_background`]: block until the
    /// pending load finishes or `timeout` passes.
    pub fn wait_background(&mut self, grid: &Grid, timeout: Duration) -> bool {
        if !self.background.wait(timeout) {
            return false;
        }
        self.scaled_background = None;
        self.render_full(grid);
        true
    }

    // ========================================================================
    // FULL FRAME
    // ========================================================================

    pub fn render_full(&mut self, grid: &Grid) {
        let colors = self.config.theme.colors();

        self.surface.clear(colors.background);
        self.draw_background_image();
        self.draw_grid_lines(colors.grid_line);

        for cell in grid.cells() {
            if let Some(color) = &cell.color
                && self.in_grid(cell.x, cell.y)
            {
                let rect = self.rect(cell.x, cell.y);
                self.draw_cell_fill(rect, color);
                self.draw_label(rect, color);
            }
        }

        self.draw_guides(colors.guide_line);
        if self.config.show_center_mark {
            self.draw_center_mark(colors.center_mark);
        }
        if self.config.symmetry.enabled {
            self.draw_symmetry_line(colors);
        }

        self.generation += 1;
    }

    /// Redraw one cell's interior.  Grid lines, guides and overlays around it
    /// are left as they are.
    pub fn render_cell(&mut self, x: u32, y: u32, color: Option<&BeadColor>) {
        if !self.in_grid(x, y) {
            return;
        }
        let colors = self.config.theme.colors();
        let rect = self.rect(x, y);
        let (ix, iy, iw, ih) = self.interior(rect);
        self.surface.fill_rect(ix, iy, iw, ih, colors.cell_background);
        if let Some(color) = color {
            self.draw_cell_fill(rect, color);
            self.draw_label(rect, color);
        }
        self.generation += 1;
    }

    // ========================================================================
    // MARKING VIEW
    // ========================================================================

    /// Assembly view: hidden colors are left out, placed cells get a green
    /// tint and a check mark, the hovered cell is highlighted.
    pub fn render_marking(&mut self, grid: &Grid, marks: &MarkedCells) {
        let colors = self.config.theme.colors();

        self.surface.clear(colors.background);
        self.draw_grid_lines(colors.grid_line);

        for cell in grid.cells() {
            if let Some(color) = &cell.color
                && !self.config.hidden_colors.contains(color)
                && self.in_grid(cell.x, cell.y)
            {
                let rect = self.rect(cell.x, cell.y);
                self.draw_cell_fill(rect, color);
                self.draw_label(rect, color);
            }
        }

        for id in marks.iter() {
            if !self.in_grid(id.x, id.y) {
                continue;
            }
            let r = self.rect(id.x, id.y);
            self.surface.fill_rect(r.x, r.y, r.width, r.height, colors.mark_fill);
            let check = [
                (r.x + r.width * 0.25, r.y + r.height * 0.5),
                (r.x + r.width * 0.4, r.y + r.height * 0.7),
                (r.x + r.width * 0.75, r.y + r.height * 0.3),
            ];
            self.surface.stroke_polyline(&check, 2.5, colors.mark_check);
        }

        self.draw_guides(colors.marking_guide);
        if self.config.show_center_mark {
            self.draw_center_mark(colors.marking_center);
        }

        if let Some(hovered) = self.config.hovered_cell
            && self.in_grid(hovered.x, hovered.y)
        {
            let hidden = grid
                .color_at(hovered.x, hovered.y)
                .is_some_and(|c| self.config.hidden_colors.contains(c));
            if !hidden {
                let r = self.rect(hovered.x, hovered.y);
                self.surface.fill_rect(r.x, r.y, r.width, r.height, colors.hover_fill);
            }
        }

        self.generation += 1;
    }

    // ========================================================================
    // LAYERS
    // ========================================================================

    fn in_grid(&self, x: u32, y: u32) -> bool {
        self.config.viewport().contains(CellId::new(x, y))
    }

    fn rect(&self, x: u32, y: u32) -> CellRect {
        viewport::rect_of(CellId::new(x, y), &self.config.viewport())
    }

    fn grid_extent(&self) -> (f32, f32, f32, f32) {
        let (w, h) = viewport::canvas_size(&self.config.viewport());
        (self.config.offset_x, self.config.offset_y, w, h)
    }

    fn draw_background_image(&mut self) {
        let Some(bg) = &self.config.background_image else {
            return;
        };
        let opacity = bg.opacity_percent / 100.0;
        let Some(source) = self.background.image() else {
            return;
        };
        let (x, y, w, h) = self.grid_extent();
        let Some(rect) = self.surface.device_rect(x, y, w, h) else {
            return;
        };

        let stale = self.scaled_background.as_ref().is_none_or(|(key, _)| *key != rect);
        if stale {
            let (x0, y0, x1, y1) = rect;
            let scaled = imageops::resize(source, x1 - x0, y1 - y0, FilterType::Triangle);
            self.scaled_background = Some((rect, scaled));
        }
        if let Some(((x0, y0, _, _), scaled)) = &self.scaled_background {
            self.surface.blend_image(scaled, *x0, *y0, opacity);
        }
    }

    /// One line per boundary, both outer edges included.
    fn draw_grid_lines(&mut self, color: Rgba<u8>) {
        let (ox, oy, w, h) = self.grid_extent();
        let cs = self.config.cell_size;
        for x in 0..=self.config.width {
            let pos = inside(ox + x as f32 * cs, ox + w, 1.0);
            self.surface.vline(pos, oy, oy + h, 1.0, color);
        }
        for y in 0..=self.config.height {
            let pos = inside(oy + y as f32 * cs, oy + h, 1.0);
            self.surface.hline(pos, ox, ox + w, 1.0, color);
        }
    }

    /// The part of a cell inside its grid lines.  The last column and row
    /// stop short of the far outer line.
    fn interior(&self, rect: CellRect) -> (f32, f32, f32, f32) {
        let (ox, oy, w, h) = self.grid_extent();
        let right = (rect.x + rect.width).min(ox + w - 1.0);
        let bottom = (rect.y + rect.height).min(oy + h - 1.0);
        (rect.x + 1.0, rect.y + 1.0, right - rect.x - 1.0, bottom - rect.y - 1.0)
    }

    fn draw_cell_fill(&mut self, rect: CellRect, color: &BeadColor) {
        let (x, y, w, h) = self.interior(rect);
        if color.is_frosted() {
            self.surface.fill_with(x, y, w, h, frosted_shade);
        } else if let Some(rgba) = color.to_rgba() {
            self.surface.fill_rect(x, y, w, h, rgba);
        }
    }

    fn draw_label(&mut self, rect: CellRect, color: &BeadColor) {
        if !self.config.labels_visible() {
            return;
        }
        let Some(id) = self.palette.color_id(color) else {
            return;
        };
        let Some(font) = text::label_font() else {
            return;
        };
        text::draw_centered(
            &mut self.surface,
            font,
            id,
            rect.x + rect.width / 2.0,
            rect.y + rect.height / 2.0,
            color.contrast_color(),
        );
    }

    fn draw_guides(&mut self, color: Rgba<u8>) {
        let (ox, oy, w, h) = self.grid_extent();
        let cs = self.config.cell_size;
        for &row in self.config.horizontal_guides.iter().filter(|&&r| r < self.config.height) {
            let pos = inside(oy + (row + 1) as f32 * cs, oy + h, 2.0);
            self.surface.hline(pos, ox, ox + w, 2.0, color);
        }
        for &col in self.config.vertical_guides.iter().filter(|&&c| c < self.config.width) {
            let pos = inside(ox + (col + 1) as f32 * cs, ox + w, 2.0);
            self.surface.vline(pos, oy, oy + h, 2.0, color);
        }
    }

    /// Crosshair at the grid's geometric center.
    fn draw_center_mark(&mut self, color: Rgba<u8>) {
        let (ox, oy, w, h) = self.grid_extent();
        let (cx, cy) = (ox + w / 2.0, oy + h / 2.0);
        let size = (self.config.cell_size * 0.3).min(8.0);
        self.surface.hline(cy, cx - size, cx + size, 1.0, color);
        self.surface.vline(cx, cy - size, cy + size, 1.0, color);
    }

    /// Only drawn when the mirrored dimension is even; with an odd count the
    /// axis runs through the middle cells, which mirror onto themselves.
    fn draw_symmetry_line(&mut self, colors: &ThemeColors) {
        let (ox, oy, w, h) = self.grid_extent();
        let cs = self.config.cell_size;
        match self.config.symmetry.axis {
            SymmetryAxis::X if self.config.width % 2 == 0 => {
                let x = ox + (self.config.width / 2) as f32 * cs;
                self.surface.vline(x, oy, oy + h, 2.0, colors.symmetry_line);
            }
            SymmetryAxis::Y if self.config.height % 2 == 0 => {
                let y = oy + (self.config.height / 2) as f32 * cs;
                self.surface.hline(y, ox, ox + w, 2.0, colors.symmetry_line);
            }
            _ => {}
        }
    }
}

/// Pull a line centred on the far edge back onto the surface.
fn inside(pos: f32, end: f32, thickness: f32) -> f32 {
    pos.min(end - thickness / 2.0)
}

/// Pattern squares are anchored to the surface origin, not the cell.
fn frosted_shade(x: f32, y: f32) -> Rgba<u8> {
    let sx = (x / FROSTED_SQUARE).floor() as i64;
    let sy = (y / FROSTED_SQUARE).floor() as i64;
    if (sx + sy).rem_euclid(2) == 0 {
        FROSTED_LIGHT
    } else {
        FROSTED_DARK
    }
}
