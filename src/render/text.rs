//! Bitmap text for text and callout labels
//!
//! Uses the 8x8 `font8x8` glyphs scaled up by an integer factor, so output
//! is identical on every machine and needs no font files.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

use super::geometry::label::GLYPH_SIZE;

/// Size in pixels of `text` laid out at `scale`
pub fn text_size(text: &str, scale: u32) -> (f32, f32) {
    let cell = (GLYPH_SIZE * scale.max(1)) as f32;
    let lines: Vec<&str> = text.lines().collect();
    let widest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    (widest as f32 * cell, lines.len().max(1) as f32 * cell)
}

/// Fill `text` with its top-left corner at (x, y)
pub fn fill_text(pixmap: &mut Pixmap, x: f32, y: f32, text: &str, paint: &Paint, scale: u32) {
    let scale = scale.max(1);
    let cell = (GLYPH_SIZE * scale) as f32;
    let px = scale as f32;

    let mut pb = PathBuilder::new();
    for (line_idx, line) in text.lines().enumerate() {
        let line_y = y + line_idx as f32 * cell;
        for (col, ch) in line.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                continue;
            };
            let glyph_x = x + col as f32 * cell;
            for (row_idx, row) in glyph.iter().enumerate() {
                for bit in 0..GLYPH_SIZE {
                    if (*row >> bit) & 1 == 0 {
                        continue;
                    }
                    let rx = glyph_x + bit as f32 * px;
                    let ry = line_y + row_idx as f32 * px;
                    if let Some(rect) = Rect::from_xywh(rx, ry, px, px) {
                        pb.push_rect(rect);
                    }
                }
            }
        }
    }

    if let Some(path) = pb.finish() {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_size_multiline() {
        assert_eq!(text_size("abc", 2), (48.0, 16.0));
        assert_eq!(text_size("ab\nlonger", 1), (48.0, 16.0));
        assert_eq!(text_size("", 3), (0.0, 24.0));
    }

    #[test]
    fn test_fill_text_marks_pixels_inside_box() {
        let mut pixmap = Pixmap::new(64, 32).unwrap();
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 255);
        paint.anti_alias = false;
        fill_text(&mut pixmap, 4.0, 4.0, "Hi", &paint, 2);

        let width = pixmap.width() as usize;
        let mut lit = 0;
        for (i, px) in pixmap.pixels().iter().enumerate() {
            if px.alpha() > 0 {
                let (x, y) = (i % width, i / width);
                assert!((4..36).contains(&x) && (4..20).contains(&y));
                lit += 1;
            }
        }
        assert!(lit > 0);
    }
}
