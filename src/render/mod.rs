//! CPU grid rendering.
//!
//! [`GridRenderer`] owns a [`Surface`] (an RGBA pixel buffer at device
//! resolution) and draws the bead grid onto it from a [`RenderConfig`].
//! Hosts read the surface back, either uploading it as a texture or saving it.

pub mod background;
pub mod grid_renderer;
pub mod surface;
pub mod text;

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::canvas::{CellId, Symmetry};
use crate::palette::BeadColor;
use crate::viewport::Viewport;

pub use background::{BackgroundLoader, FileImageLoader, ImageLoader};
pub use grid_renderer::GridRenderer;
pub use surface::Surface;

/// Largest surface edge in device pixels.
pub const MAX_SURFACE_DIM: u32 = 16_384;

/// Labels are only legible from this cell size (logical px) upward.
pub const LABEL_MIN_CELL_SIZE: f32 = 16.0;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The backing pixel store cannot be created for the requested geometry.
    SurfaceUnavailable(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::SurfaceUnavailable(e) => write!(f, "Surface unavailable: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

// ============================================================================
// THEME
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Fixed colors of one theme.
#[derive(Clone, Copy, Debug)]
pub struct ThemeColors {
    pub background: Rgba<u8>,
    pub grid_line: Rgba<u8>,
    pub cell_background: Rgba<u8>,
    pub guide_line: Rgba<u8>,
    pub center_mark: Rgba<u8>,
    pub symmetry_line: Rgba<u8>,
    pub mark_fill: Rgba<u8>,
    pub mark_check: Rgba<u8>,
    pub hover_fill: Rgba<u8>,
    /// Guides in the marking view are drawn faint.
    pub marking_guide: Rgba<u8>,
    pub marking_center: Rgba<u8>,
}

const LIGHT: ThemeColors = ThemeColors {
    background: Rgba([0xff, 0xff, 0xff, 0xff]),
    grid_line: Rgba([0xe4, 0xe4, 0xe7, 0xff]),
    cell_background: Rgba([0xff, 0xff, 0xff, 0xff]),
    guide_line: Rgba([0x60, 0xa5, 0xfa, 0xff]),
    center_mark: Rgba([0xd4, 0xd4, 0xd8, 0xff]),
    symmetry_line: Rgba([0xc0, 0x84, 0xfc, 0xff]),
    mark_fill: Rgba([34, 197, 94, 38]),
    mark_check: Rgba([34, 197, 94, 204]),
    hover_fill: Rgba([0, 0, 0, 13]),
    marking_guide: Rgba([59, 130, 246, 51]),
    marking_center: Rgba([200, 200, 200, 77]),
};

const DARK: ThemeColors = ThemeColors {
    background: Rgba([0x18, 0x18, 0x1b, 0xff]),
    grid_line: Rgba([0x3f, 0x3f, 0x46, 0xff]),
    cell_background: Rgba([0x27, 0x27, 0x2a, 0xff]),
    guide_line: Rgba([0x3b, 0x82, 0xf6, 0xff]),
    center_mark: Rgba([0x52, 0x52, 0x5b, 0xff]),
    symmetry_line: Rgba([0xa8, 0x55, 0xf7, 0xff]),
    mark_fill: Rgba([34, 197, 94, 51]),
    mark_check: Rgba([34, 197, 94, 204]),
    hover_fill: Rgba([255, 255, 255, 26]),
    marking_guide: Rgba([59, 130, 246, 77]),
    marking_center: Rgba([161, 161, 170, 77]),
};

impl Theme {
    pub fn colors(self) -> &'static ThemeColors {
        match self {
            Theme::Light => &LIGHT,
            Theme::Dark => &DARK,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundImage {
    /// File path of the reference image.
    pub source: String,
    /// 0–100.
    pub opacity_percent: f32,
}

/// Everything the renderer draws from, besides the grid itself.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Logical pixels per cell (base size × zoom).
    pub cell_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub device_pixel_ratio: f32,
    pub theme: Theme,
    pub show_labels: bool,
    pub show_center_mark: bool,
    /// Row indices; a guide is drawn below each.
    pub horizontal_guides: BTreeSet<u32>,
    /// Column indices; a guide is drawn right of each.
    pub vertical_guides: BTreeSet<u32>,
    pub symmetry: Symmetry,
    pub hovered_cell: Option<CellId>,
    pub background_image: Option<BackgroundImage>,
    /// Colors left out of the marking view.
    pub hidden_colors: HashSet<BeadColor>,
}

/// What a config change requires of the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Redraw {
    None,
    Full,
    /// Surface size changed; a new surface is needed before a full redraw.
    Reallocate,
}

impl RenderConfig {
    pub fn new(width: u32, height: u32, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            offset_x: 0.0,
            offset_y: 0.0,
            device_pixel_ratio: 1.0,
            theme: Theme::Light,
            show_labels: false,
            show_center_mark: true,
            horizontal_guides: BTreeSet::new(),
            vertical_guides: BTreeSet::new(),
            symmetry: Symmetry::default(),
            hovered_cell: None,
            background_image: None,
            hidden_colors: HashSet::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            cell_size: self.cell_size,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }

    /// Surface extent in logical pixels (grid plus its offset).
    pub fn logical_size(&self) -> (f32, f32) {
        (
            self.offset_x + self.width as f32 * self.cell_size,
            self.offset_y + self.height as f32 * self.cell_size,
        )
    }

    /// Every tenth row/column boundary, as drawn by default on new grids.
    pub fn with_standard_guides(mut self) -> Self {
        self.horizontal_guides = standard_guides(self.height);
        self.vertical_guides = standard_guides(self.width);
        self
    }

    pub fn labels_visible(&self) -> bool {
        self.show_labels && self.cell_size >= LABEL_MIN_CELL_SIZE
    }

    pub fn merged(&self, update: RenderConfigUpdate) -> RenderConfig {
        let mut next = self.clone();
        if let Some(v) = update.width {
            next.width = v;
        }
        if let Some(v) = update.height {
            next.height = v;
        }
        if let Some(v) = update.cell_size {
            next.cell_size = v;
        }
        if let Some(v) = update.offset_x {
            next.offset_x = v;
        }
        if let Some(v) = update.offset_y {
            next.offset_y = v;
        }
        if let Some(v) = update.device_pixel_ratio {
            next.device_pixel_ratio = v;
        }
        if let Some(v) = update.theme {
            next.theme = v;
        }
        if let Some(v) = update.show_labels {
            next.show_labels = v;
        }
        if let Some(v) = update.show_center_mark {
            next.show_center_mark = v;
        }
        if let Some(v) = update.horizontal_guides {
            next.horizontal_guides = v;
        }
        if let Some(v) = update.vertical_guides {
            next.vertical_guides = v;
        }
        if let Some(v) = update.symmetry {
            next.symmetry = v;
        }
        if let Some(v) = update.hovered_cell {
            next.hovered_cell = v;
        }
        if let Some(v) = update.background_image {
            next.background_image = v;
        }
        if let Some(v) = update.hidden_colors {
            next.hidden_colors = v;
        }
        next
    }

    /// How much work switching from `self` to `other` takes.
    pub fn redraw_needed(&self, other: &RenderConfig) -> Redraw {
        if self.logical_size() != other.logical_size()
            || self.device_pixel_ratio != other.device_pixel_ratio
        {
            Redraw::Reallocate
        } else if self != other {
            Redraw::Full
        } else {
            Redraw::None
        }
    }
}

/// Shallow override of [`RenderConfig`]; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderConfigUpdate {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub cell_size: Option<f32>,
    pub offset_x: Option<f32>,
    pub offset_y: Option<f32>,
    pub device_pixel_ratio: Option<f32>,
    pub theme: Option<Theme>,
    pub show_labels: Option<bool>,
    pub show_center_mark: Option<bool>,
    pub horizontal_guides: Option<BTreeSet<u32>>,
    pub vertical_guides: Option<BTreeSet<u32>>,
    pub symmetry: Option<Symmetry>,
    pub hovered_cell: Option<Option<CellId>>,
    pub background_image: Option<Option<BackgroundImage>>,
    pub hidden_colors: Option<HashSet<BeadColor>>,
}

/// Indices 9, 19, 29, … short of the last row/column.
pub fn standard_guides(dim: u32) -> BTreeSet<u32> {
    (9..dim.saturating_sub(1)).step_by(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_guides_every_tenth() {
        assert_eq!(standard_guides(29).into_iter().collect::<Vec<_>>(), vec![9, 19]);
        assert_eq!(standard_guides(30).into_iter().collect::<Vec<_>>(), vec![9, 19]);
        assert_eq!(standard_guides(31).into_iter().collect::<Vec<_>>(), vec![9, 19, 29]);
        assert!(standard_guides(10).is_empty());
    }

    #[test]
    fn redraw_classification() {
        let base = RenderConfig::new(10, 10, 20.0);
        assert_eq!(base.redraw_needed(&base.clone()), Redraw::None);

        let themed = base.merged(RenderConfigUpdate { theme: Some(Theme::Dark), ..Default::default() });
        assert_eq!(base.redraw_needed(&themed), Redraw::Full);

        let zoomed = base.merged(RenderConfigUpdate { cell_size: Some(24.0), ..Default::default() });
        assert_eq!(base.redraw_needed(&zoomed), Redraw::Reallocate);

        let hidpi = base.merged(RenderConfigUpdate { device_pixel_ratio: Some(2.0), ..Default::default() });
        assert_eq!(base.redraw_needed(&hidpi), Redraw::Reallocate);
    }

    #[test]
    fn merge_can_clear_optional_fields() {
        let mut base = RenderConfig::new(4, 4, 20.0);
        base.hovered_cell = Some(CellId::new(1, 1));
        let next = base.merged(RenderConfigUpdate { hovered_cell: Some(None), ..Default::default() });
        assert_eq!(next.hovered_cell, None);
        assert_eq!(next.cell_size, 20.0);
    }

    #[test]
    fn labels_show_from_sixteen_pixel_cells() {
        let mut config = RenderConfig::new(4, 4, LABEL_MIN_CELL_SIZE);
        assert!(!config.labels_visible());
        config.show_labels = true;
        assert!(config.labels_visible());
        config.cell_size = 15.5;
        assert!(!config.labels_visible());
    }

    #[test]
    fn themes_parse() {
        assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("sepia".parse::<Theme>().is_err());
    }
}
