//! Typefaces - metrics and glyph drawing behind one trait

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

/// Horizontal and vertical metrics in pixels
pub trait TextMetrics: Send + Sync {
    /// Advance width of `text` laid out on one line
    fn advance(&self, text: &str) -> f32;

    /// Distance from the top of a line to its baseline
    fn ascent(&self) -> f32;

    /// Distance between consecutive baselines
    fn line_height(&self) -> f32;
}

/// A typeface that can also draw a line of text onto a canvas
pub trait Typeface: TextMetrics {
    fn draw_line(&self, canvas: &mut RgbaImage, origin_x: f32, baseline_y: f32, text: &str, color: Rgba<u8>);
}

/// Outline font rasterized with ab_glyph
pub struct OutlineFace {
    font: FontArc,
    scale: PxScale,
}

impl OutlineFace {
    /// `size` is in points, drawn at 1px per point
    pub fn new(font: FontArc, size: u32) -> Self {
        Self {
            font,
            scale: PxScale::from(size as f32),
        }
    }

    /// Glyph ids with the x offset each one is placed at
    fn positioned(&self, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = 0.0;
        let mut previous: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret)
    }
}

impl TextMetrics for OutlineFace {
    fn advance(&self, text: &str) -> f32 {
        self.positioned(text).1
    }

    fn ascent(&self) -> f32 {
        self.font.as_scaled(self.scale).ascent()
    }

    fn line_height(&self) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.height() + scaled.line_gap()
    }
}

impl Typeface for OutlineFace {
    fn draw_line(&self, canvas: &mut RgbaImage, origin_x: f32, baseline_y: f32, text: &str, color: Rgba<u8>) {
        let (glyphs, _) = self.positioned(text);

        for (id, offset) in glyphs {
            let glyph = id.with_scale_and_position(self.scale, point(origin_x + offset, baseline_y));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, coverage| {
                let px = bounds.min.x as i64 + x as i64;
                let py = bounds.min.y as i64 + y as i64;
                blend_pixel(canvas, px, py, color, coverage);
            });
        }
    }
}

/// Fixed-pitch face that draws each visible character as a solid block.
///
/// Needs no font file, so it stands in when no outline font is installed.
#[derive(Debug, Clone)]
pub struct BlockFace {
    size: f32,
}

impl BlockFace {
    pub fn new(size: u32) -> Self {
        Self { size: size as f32 }
    }

    fn cell_width(&self) -> f32 {
        self.size * 0.6
    }
}

impl TextMetrics for BlockFace {
    fn advance(&self, text: &str) -> f32 {
        text.chars().filter(|c| !c.is_control()).count() as f32 * self.cell_width()
    }

    fn ascent(&self) -> f32 {
        self.size * 0.8
    }

    fn line_height(&self) -> f32 {
        self.size * 1.2
    }
}

impl Typeface for BlockFace {
    fn draw_line(&self, canvas: &mut RgbaImage, origin_x: f32, baseline_y: f32, text: &str, color: Rgba<u8>) {
        let cell = self.cell_width();
        let top = (baseline_y - self.ascent() * 0.9).round() as i64;
        let bottom = baseline_y.round() as i64;

        for (i, ch) in text.chars().filter(|c| !c.is_control()).enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = (origin_x + i as f32 * cell + cell * 0.1).round() as i64;
            let right = (origin_x + (i + 1) as f32 * cell - cell * 0.1).round() as i64;
            for py in top..bottom {
                for px in left..right {
                    blend_pixel(canvas, px, py, color, 1.0);
                }
            }
        }
    }
}

/// Alpha-blend `color` onto one pixel; out-of-bounds coordinates are ignored
pub(crate) fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0) * (color.0[3] as f32 / 255.0);
    if alpha <= 0.0 {
        return;
    }

    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let src = color.0[channel] as f32;
        let dst = pixel.0[channel] as f32;
        pixel.0[channel] = (src * alpha + dst * (1.0 - alpha)).round() as u8;
    }
    let dst_alpha = pixel.0[3] as f32 / 255.0;
    pixel.0[3] = ((alpha + dst_alpha * (1.0 - alpha)) * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_face_metrics() {
        let face = BlockFace::new(10);
        assert_eq!(face.advance("abcde"), 30.0);
        assert_eq!(face.advance(""), 0.0);
        assert_eq!(face.ascent(), 8.0);
        assert_eq!(face.line_height(), 12.0);
    }

    #[test]
    fn test_block_face_draws_inside_canvas() {
        let face = BlockFace::new(20);
        let mut canvas = RgbaImage::from_pixel(40, 30, Rgba([255, 255, 255, 255]));
        face.draw_line(&mut canvas, 0.0, 20.0, "ab", Rgba([0, 0, 0, 255]));

        let dark = canvas.pixels().filter(|p| p.0[0] == 0).count();
        assert!(dark > 0);

        // Glyphs past the right edge are clipped, not a panic
        face.draw_line(&mut canvas, 30.0, 20.0, "wxyz", Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_blend_pixel() {
        let mut canvas = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        blend_pixel(&mut canvas, 0, 0, Rgba([0, 0, 0, 255]), 0.5);
        assert_eq!(canvas.get_pixel(0, 0).0, [128, 128, 128, 255]);

        blend_pixel(&mut canvas, -1, 5, Rgba([0, 0, 0, 255]), 1.0);
        assert_eq!(canvas.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }
}
