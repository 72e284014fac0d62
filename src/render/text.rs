// ============================================================================
// CELL LABELS: palette IDs rasterized with ab_glyph
// ============================================================================

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::Rgba;

use super::surface::Surface;

/// Label size in logical pixels.
pub const LABEL_FONT_SIZE: f32 = 10.0;

static LABEL_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

/// Bold monospace system font shared by every renderer.  Looked up once;
/// when none is installed labels are skipped.
pub fn label_font() -> Option<&'static FontArc> {
    LABEL_FONT
        .get_or_init(|| {
            let font = load_monospace_bold();
            if font.is_none() {
                crate::log_warn!("No monospace system font found; cell labels disabled");
            }
            font
        })
        .as_ref()
}

fn load_monospace_bold() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight::BOLD;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(&[FamilyName::Monospace], &props)
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes = font_data.copy_font_data()?;
    FontArc::try_from_vec((*bytes).clone()).ok()
}

/// Width of `text` at `px` size, in the same unit as `px`.
pub fn text_width(font: &FontArc, text: &str, px: f32) -> f32 {
    let scaled = font.as_scaled(px);
    let mut width = 0.0;
    let mut last = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        last = Some(id);
    }
    width
}

/// Draw `text` centered on the logical point `(cx, cy)`, vertically centered
/// on the em box.
pub fn draw_centered(
    surface: &mut Surface,
    font: &FontArc,
    text: &str,
    cx: f32,
    cy: f32,
    color: Rgba<u8>,
) {
    let px = LABEL_FONT_SIZE * surface.scale();
    let scaled = font.as_scaled(px);
    let width = text_width(font, text, px);

    let origin_x = cx * surface.scale() - width / 2.0;
    let baseline = cy * surface.scale() + (scaled.ascent() + scaled.descent()) / 2.0;

    let mut cursor = origin_x;
    let mut last = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(px, point(cursor, baseline));
        cursor += scaled.h_advance(id);
        last = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
        outlined.draw(|gx, gy, coverage| {
            surface.blend_pixel(left + gx as i32, top + gy as i32, color, coverage);
        });
    }
}
