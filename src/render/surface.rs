// ============================================================================
// SURFACE: RGBA pixel buffer addressed in logical coordinates
// ============================================================================
//
// Every drawing call takes logical pixels and is scaled by the device pixel
// ratio here.  Rect edges are rounded to the nearest device pixel so adjacent
// rects tile without gaps; anything outside the buffer is clipped.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::{RenderError, MAX_SURFACE_DIM};

pub struct Surface {
    image: RgbaImage,
    scale: f32,
    logical_width: f32,
    logical_height: f32,
}

impl Surface {
    pub fn new(logical_width: f32, logical_height: f32, scale: f32) -> Result<Self, RenderError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::SurfaceUnavailable(format!(
                "invalid device pixel ratio {}",
                scale
            )));
        }
        if !logical_width.is_finite() || !logical_height.is_finite() {
            return Err(RenderError::SurfaceUnavailable("non-finite surface size".into()));
        }
        let device_w = (logical_width * scale).ceil();
        let device_h = (logical_height * scale).ceil();
        if device_w < 1.0 || device_h < 1.0 {
            return Err(RenderError::SurfaceUnavailable(format!(
                "zero-sized surface {}x{}",
                device_w, device_h
            )));
        }
        if device_w > MAX_SURFACE_DIM as f32 || device_h > MAX_SURFACE_DIM as f32 {
            return Err(RenderError::SurfaceUnavailable(format!(
                "surface {}x{} exceeds maximum {}x{}",
                device_w, device_h, MAX_SURFACE_DIM, MAX_SURFACE_DIM
            )));
        }

        Ok(Self {
            image: RgbaImage::new(device_w as u32, device_h as u32),
            scale,
            logical_width,
            logical_height,
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn logical_size(&self) -> (f32, f32) {
        (self.logical_width, self.logical_height)
    }

    pub fn device_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Device pixel containing the logical point, if on the surface.
    pub fn pixel_at(&self, x: f32, y: f32) -> Option<Rgba<u8>> {
        let dx = (x * self.scale).floor();
        let dy = (y * self.scale).floor();
        if dx < 0.0 || dy < 0.0 {
            return None;
        }
        let (dx, dy) = (dx as u32, dy as u32);
        (dx < self.image.width() && dy < self.image.height()).then(|| *self.image.get_pixel(dx, dy))
    }

    /// Device column/row span of a logical interval, clipped to `limit`.
    fn span(&self, start: f32, len: f32, limit: u32) -> Option<(u32, u32)> {
        let a = (start * self.scale).round().max(0.0);
        let b = ((start + len) * self.scale).round().min(limit as f32);
        (b > a).then(|| (a as u32, b as u32))
    }

    /// Device rect of a logical rect as `(x0, y0, x1, y1)`, exclusive end.
    pub fn device_rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<(u32, u32, u32, u32)> {
        let (x0, x1) = self.span(x, w, self.image.width())?;
        let (y0, y1) = self.span(y, h, self.image.height())?;
        Some((x0, y0, x1, y1))
    }

    /// Overwrite every pixel (alpha included).
    pub fn clear(&mut self, color: Rgba<u8>) {
        let row_bytes = self.image.width() as usize * 4;
        self.image.par_chunks_mut(row_bytes).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        });
    }

    /// Fill a logical rect.  Opaque colors overwrite, translucent ones blend.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        let Some((x0, y0, x1, y1)) = self.device_rect(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                if color[3] == 255 {
                    self.image.put_pixel(px, py, color);
                } else {
                    blend_over(self.image.get_pixel_mut(px, py), color, 1.0);
                }
            }
        }
    }

    /// Fill a logical rect with a color computed per device pixel from that
    /// pixel's logical position (pattern fills).
    pub fn fill_with(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        shade: impl Fn(f32, f32) -> Rgba<u8>,
    ) {
        let Some((x0, y0, x1, y1)) = self.device_rect(x, y, w, h) else {
            return;
        };
        let inv = 1.0 / self.scale;
        for py in y0..y1 {
            for px in x0..x1 {
                let color = shade(px as f32 * inv, py as f32 * inv);
                self.image.put_pixel(px, py, color);
            }
        }
    }

    /// Vertical line of `thickness` logical px centered on `x`.
    pub fn vline(&mut self, x: f32, y0: f32, y1: f32, thickness: f32, color: Rgba<u8>) {
        self.fill_rect(x - thickness / 2.0, y0, thickness, y1 - y0, color);
    }

    /// Horizontal line of `thickness` logical px centered on `y`.
    pub fn hline(&mut self, y: f32, x0: f32, x1: f32, thickness: f32, color: Rgba<u8>) {
        self.fill_rect(x0, y - thickness / 2.0, x1 - x0, thickness, color);
    }

    /// Stroke an open polyline with round caps and joins.
    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
        if points.len() < 2 {
            return;
        }
        let half = width * self.scale / 2.0;
        let pts: Vec<(f32, f32)> = points.iter().map(|(x, y)| (x * self.scale, y * self.scale)).collect();

        let min_x = pts.iter().map(|p| p.0).fold(f32::INFINITY, f32::min) - half - 1.0;
        let max_x = pts.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max) + half + 1.0;
        let min_y = pts.iter().map(|p| p.1).fold(f32::INFINITY, f32::min) - half - 1.0;
        let max_y = pts.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max) + half + 1.0;

        let x0 = min_x.max(0.0) as u32;
        let y0 = min_y.max(0.0) as u32;
        let x1 = (max_x.max(0.0) as u32).min(self.image.width());
        let y1 = (max_y.max(0.0) as u32).min(self.image.height());

        for py in y0..y1 {
            for px in x0..x1 {
                let c = (px as f32 + 0.5, py as f32 + 0.5);
                let dist = pts
                    .windows(2)
                    .map(|seg| segment_distance(c, seg[0], seg[1]))
                    .fold(f32::INFINITY, f32::min);
                let coverage = (half + 0.5 - dist).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    blend_over(self.image.get_pixel_mut(px, py), color, coverage);
                }
            }
        }
    }

    /// Blend an image already sized to the device rect starting at
    /// `(left, top)` device pixels, with an overall opacity.
    pub fn blend_image(&mut self, src: &RgbaImage, left: u32, top: u32, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity == 0.0 {
            return;
        }
        let width = self.image.width();
        let row_bytes = width as usize * 4;
        let src_w = src.width();
        let src_h = src.height();
        self.image
            .par_chunks_mut(row_bytes)
            .enumerate()
            .skip(top as usize)
            .take(src_h as usize)
            .for_each(|(py, row)| {
                let sy = py as u32 - top;
                for sx in 0..src_w {
                    let px = left + sx;
                    if px >= width {
                        break;
                    }
                    let i = px as usize * 4;
                    let mut dst = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                    blend_over(&mut dst, *src.get_pixel(sx, sy), opacity);
                    row[i..i + 4].copy_from_slice(&dst.0);
                }
            });
    }

    /// Blend `color` into one device pixel with the given coverage.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }
        blend_over(self.image.get_pixel_mut(x as u32, y as u32), color, coverage.clamp(0.0, 1.0));
    }
}

/// Source-over compositing of `src` (scaled by `coverage`) onto `dst`.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = src[c] as f32;
        let d = dst[c] as f32;
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + abx * t, a.1 + aby * t);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
