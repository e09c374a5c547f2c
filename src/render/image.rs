//! Image compositing for annotations using tiny-skia
//!
//! These functions flatten the base image and the ordered records into a
//! single raster at the base image's native resolution.

use std::io::Cursor;

use anyhow::{Context, Result, bail};
use image::{ImageFormat, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, Transform,
};

use super::geometry::{self, arrow, label, shape};
use super::text;
use crate::capture::image::BaseImage;
use crate::domain::{AnnotationRecord, AnnotationState, Color, Point, Shape, Style};

/// Rendering parameters that are fixed for a session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    /// Integer scale applied to the 8x8 label glyphs
    pub text_scale: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { text_scale: 3 }
    }
}

/// Something that can flatten records onto a base image
///
/// The session only talks to this trait so export can be exercised
/// against other rasterizers.
pub trait Compositor: Send + Sync {
    /// Produce the encoded composite image
    fn render(&self, base: &BaseImage, records: &[AnnotationRecord]) -> Result<Vec<u8>>;
}

/// The tiny-skia compositor producing PNG output
#[derive(Clone, Copy, Debug, Default)]
pub struct SkiaCompositor {
    pub options: RenderOptions,
}

impl SkiaCompositor {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Compositor for SkiaCompositor {
    fn render(&self, base: &BaseImage, records: &[AnnotationRecord]) -> Result<Vec<u8>> {
        render(base, records, &self.options)
    }
}

/// Composite and encode as PNG
pub fn render(
    base: &BaseImage,
    records: &[AnnotationRecord],
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let img = composite(base, records, options)?;
    encode_png(&img)
}

/// Composite a saved annotation state, checking it belongs to this image
pub fn render_state(
    base: &BaseImage,
    state: &AnnotationState,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    if (state.image_width, state.image_height) != (base.width(), base.height()) {
        bail!(
            "Annotation state is for a {}x{} image, base image is {}x{}",
            state.image_width,
            state.image_height,
            base.width(),
            base.height()
        );
    }
    render(base, &state.records, options)
}

/// Draw every record in order over a copy of the base image
pub fn composite(
    base: &BaseImage,
    records: &[AnnotationRecord],
    options: &RenderOptions,
) -> Result<RgbaImage> {
    let mut pixmap = to_pixmap(base.rgba())?;
    for record in records {
        draw_record(&mut pixmap, record, options);
    }
    from_pixmap(&pixmap)
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode composite image as PNG")?;
    Ok(bytes)
}

/// Copy an RgbaImage into a premultiplied Pixmap
fn to_pixmap(img: &RgbaImage) -> Result<Pixmap> {
    let (w, h) = img.dimensions();
    let mut pixmap =
        Pixmap::new(w, h).with_context(|| format!("Failed to allocate {w}x{h} pixmap"))?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Copy a Pixmap back out as straight-alpha RGBA
fn from_pixmap(pixmap: &Pixmap) -> Result<RgbaImage> {
    let raw = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .context("Composite buffer does not match pixmap size")
}

fn paint(color: Color, alpha: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
    paint.anti_alias = true;
    paint
}

fn stroke(style: &Style) -> Stroke {
    Stroke {
        width: style.stroke_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

fn fill_and_stroke(
    pixmap: &mut Pixmap,
    path: &Path,
    style: &Style,
    fill_alpha: u8,
    stroke_alpha: u8,
) {
    pixmap.fill_path(
        path,
        &paint(style.color, fill_alpha),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    pixmap.stroke_path(
        path,
        &paint(style.color, stroke_alpha),
        &stroke(style),
        Transform::identity(),
        None,
    );
}

fn stroke_only(pixmap: &mut Pixmap, path: &Path, style: &Style) {
    pixmap.stroke_path(
        path,
        &paint(style.color, 255),
        &stroke(style),
        Transform::identity(),
        None,
    );
}

fn draw_record(pixmap: &mut Pixmap, record: &AnnotationRecord, options: &RenderOptions) {
    let origin = record.origin();
    let style = record.style();
    match record.shape() {
        Shape::Rectangle { width, height } => {
            if let Some(path) = build_box_path(origin, *width, *height) {
                fill_and_stroke(pixmap, &path, &style, shape::FILL_ALPHA, 255);
            }
        }
        Shape::Highlight { width, height } => {
            if let Some(path) = build_box_path(origin, *width, *height) {
                fill_and_stroke(
                    pixmap,
                    &path,
                    &style,
                    shape::HIGHLIGHT_FILL_ALPHA,
                    shape::HIGHLIGHT_STROKE_ALPHA,
                );
            }
        }
        Shape::Ellipse { radius } => {
            if let Some(path) = build_ellipse_path(origin.x, origin.y, *radius, *radius) {
                fill_and_stroke(pixmap, &path, &style, shape::FILL_ALPHA, 255);
            }
        }
        Shape::Arrow { dx, dy } => {
            if let Some(path) = build_arrow_path(origin, *dx, *dy, arrow::BARB_LENGTH) {
                stroke_only(pixmap, &path, &style);
            }
        }
        Shape::Line { dx, dy } => {
            if let Some(path) = build_polyline_path(&[origin, origin.offset(*dx, *dy)], false) {
                stroke_only(pixmap, &path, &style);
            }
        }
        Shape::Freehand { points } => {
            if let Some(path) = build_polyline_path(points, false) {
                stroke_only(pixmap, &path, &style);
            }
        }
        Shape::Polygon { points } => {
            if let Some(path) = build_polyline_path(points, true) {
                stroke_only(pixmap, &path, &style);
            }
        }
        Shape::Curve { points } => {
            if let Some(path) = build_curve_path(points) {
                stroke_only(pixmap, &path, &style);
            }
        }
        Shape::Text { text: content, .. } => {
            let mut text_paint = paint(style.color, 255);
            text_paint.anti_alias = false;
            text::fill_text(
                pixmap,
                origin.x,
                origin.y,
                content,
                &text_paint,
                options.text_scale,
            );
        }
        Shape::Callout {
            text: content,
            anchor,
        } => {
            draw_callout(pixmap, origin, *anchor, content, &style, options.text_scale);
        }
    }
}

/// Label box at `anchor` with a leader line from `target` to the box edge
fn draw_callout(
    pixmap: &mut Pixmap,
    target: Point,
    anchor: Point,
    content: &str,
    style: &Style,
    scale: u32,
) {
    let scale = scale.max(1);
    let pad = (label::CALLOUT_PADDING * scale) as f32;
    let (text_w, text_h) = text::text_size(content, scale);
    let (left, top) = (anchor.x - pad, anchor.y - pad);
    let (right, bottom) = (anchor.x + text_w + pad, anchor.y + text_h + pad);

    // Leader ends at the nearest point of the box
    let edge = Point::new(target.x.clamp(left, right), target.y.clamp(top, bottom));
    if let Some(leader) = build_polyline_path(&[target, edge], false) {
        stroke_only(pixmap, &leader, style);
    }

    if let Some(path) = build_box_path(Point::new(left, top), right - left, bottom - top) {
        pixmap.fill_path(
            &path,
            &paint(Color::rgb(255, 255, 255), label::CALLOUT_FILL_ALPHA),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        stroke_only(pixmap, &path, style);
    }

    let mut text_paint = paint(style.color, 255);
    text_paint.anti_alias = false;
    text::fill_text(pixmap, anchor.x, anchor.y, content, &text_paint, scale);
}

/// Closed box from a corner and a possibly negative extent
fn build_box_path(origin: Point, width: f32, height: f32) -> Option<Path> {
    let (min_x, min_y, max_x, max_y) =
        geometry::normalize_rect(origin.x, origin.y, origin.x + width, origin.y + height);
    let mut pb = PathBuilder::new();
    pb.move_to(min_x, min_y);
    pb.line_to(max_x, min_y);
    pb.line_to(max_x, max_y);
    pb.line_to(min_x, max_y);
    pb.close();
    pb.finish()
}

/// Build an ellipse path using cubic bezier curves
fn build_ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<Path> {
    let kx = rx * shape::BEZIER_K;
    let ky = ry * shape::BEZIER_K;

    let mut pb = PathBuilder::new();
    pb.move_to(cx, cy - ry);
    pb.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    pb.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    pb.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    pb.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
    pb.close();
    pb.finish()
}

/// Shaft plus two barbs as separate stroked segments
fn build_arrow_path(origin: Point, dx: f32, dy: f32, barb_length: f32) -> Option<Path> {
    let (end_x, end_y) = (origin.x + dx, origin.y + dy);
    let (b1x, b1y, b2x, b2y) = arrow::barb_points(origin.x, origin.y, end_x, end_y, barb_length)?;

    let mut pb = PathBuilder::new();
    pb.move_to(origin.x, origin.y);
    pb.line_to(end_x, end_y);
    pb.move_to(end_x, end_y);
    pb.line_to(b1x, b1y);
    pb.move_to(end_x, end_y);
    pb.line_to(b2x, b2y);
    pb.finish()
}

fn build_polyline_path(points: &[Point], closed: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    if closed {
        pb.close();
    }
    pb.finish()
}

/// Smooth curve through the vertices: quadratic segments between midpoints,
/// using each interior vertex as the control point
fn build_curve_path(points: &[Point]) -> Option<Path> {
    if points.len() < 3 {
        return build_polyline_path(points, false);
    }
    let mut pb = PathBuilder::new();
    pb.move_to(points[0].x, points[0].y);
    for pair in points[1..points.len() - 1].windows(2) {
        let (ctrl, next) = (pair[0], pair[1]);
        let (mx, my) = geometry::midpoint(ctrl.x, ctrl.y, next.x, next.y);
        pb.quad_to(ctrl.x, ctrl.y, mx, my);
    }
    let ctrl = points[points.len() - 2];
    let last = points[points.len() - 1];
    pb.quad_to(ctrl.x, ctrl.y, last.x, last.y);
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(w: u32, h: u32) -> BaseImage {
        BaseImage::from_rgba(RgbaImage::from_pixel(w, h, image::Rgba([40, 40, 40, 255])))
    }

    fn style(color: Color) -> Style {
        Style {
            color,
            stroke_width: 4.0,
        }
    }

    fn record(origin: Point, shape: Shape) -> AnnotationRecord {
        AnnotationRecord::new(origin, shape, style(Color::rgb(255, 0, 0))).unwrap()
    }

    fn all_kinds() -> Vec<AnnotationRecord> {
        let o = Point::new(20.0, 20.0);
        vec![
            record(
                o,
                Shape::Rectangle {
                    width: 40.0,
                    height: -10.0,
                },
            ),
            record(
                o,
                Shape::Highlight {
                    width: 30.0,
                    height: 30.0,
                },
            ),
            record(Point::new(60.0, 60.0), Shape::Ellipse { radius: 15.0 }),
            record(o, Shape::Arrow { dx: 50.0, dy: 30.0 }),
            record(
                o,
                Shape::Line {
                    dx: -10.0,
                    dy: 40.0,
                },
            ),
            record(
                o,
                Shape::Curve {
                    points: vec![
                        o,
                        Point::new(40.0, 5.0),
                        Point::new(60.0, 40.0),
                        Point::new(90.0, 10.0),
                    ],
                },
            ),
            record(
                o,
                Shape::Polygon {
                    points: vec![o, Point::new(50.0, 20.0), Point::new(35.0, 50.0)],
                },
            ),
            record(
                o,
                Shape::Freehand {
                    points: vec![o, Point::new(21.0, 25.0), Point::new(26.0, 27.0)],
                },
            ),
            record(
                Point::new(10.0, 80.0),
                Shape::Text {
                    text: "OK".into(),
                    anchor: Point::new(10.0, 80.0),
                },
            ),
            record(
                Point::new(90.0, 90.0),
                Shape::Callout {
                    text: "here".into(),
                    anchor: Point::new(60.0, 100.0),
                },
            ),
        ]
    }

    #[test]
    fn test_output_keeps_native_resolution() {
        let img = composite(&base(123, 77), &all_kinds(), &RenderOptions::default()).unwrap();
        assert_eq!(img.dimensions(), (123, 77));
    }

    #[test]
    fn test_render_is_deterministic() {
        let base = base(160, 140);
        let records = all_kinds();
        let options = RenderOptions::default();
        let first = render(&base, &records, &options).unwrap();
        let second = render(&base, &records, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_text_is_drawn_at_origin() {
        let origin = Point::new(30.0, 20.0);
        let label = record(
            origin,
            Shape::Text {
                text: "OK".into(),
                anchor: origin,
            },
        );
        let options = RenderOptions::default();
        let img = composite(&base(120, 60), &[label], &options).unwrap();
        let (w, h) = text::text_size("OK", options.text_scale);

        let inside = |x: u32, y: u32| {
            let (x, y) = (x as f32, y as f32);
            x >= origin.x && y >= origin.y && x < origin.x + w && y < origin.y + h
        };
        let mut painted = 0;
        for (x, y, pixel) in img.enumerate_pixels() {
            if pixel.0 != [40, 40, 40, 255] {
                assert!(inside(x, y), "ink outside the label at ({x}, {y})");
                painted += 1;
            }
        }
        assert!(painted > 0);
    }

    #[test]
    fn test_no_records_reproduces_base() {
        let base = base(16, 9);
        let img = composite(&base, &[], &RenderOptions::default()).unwrap();
        assert_eq!(&img, base.rgba());
    }

    #[test]
    fn test_rectangle_stroke_and_translucent_fill() {
        let base = base(100, 100);
        let rect = record(
            Point::new(20.0, 20.0),
            Shape::Rectangle {
                width: 60.0,
                height: 40.0,
            },
        );
        let img = composite(&base, &[rect], &RenderOptions::default()).unwrap();

        // On the top edge: solid stroke color
        assert_eq!(img.get_pixel(50, 20).0, [255, 0, 0, 255]);
        // Inside: base tinted towards red but not replaced
        let inside = img.get_pixel(50, 40).0;
        assert!(inside[0] > 40 && inside[0] < 255);
        assert_eq!(inside[3], 255);
        // Outside untouched
        assert_eq!(img.get_pixel(5, 5).0, [40, 40, 40, 255]);
    }

    #[test]
    fn test_later_records_paint_over_earlier() {
        let base = base(60, 60);
        let o = Point::new(10.0, 30.0);
        let line = Shape::Line { dx: 40.0, dy: 0.0 };
        let red = AnnotationRecord::new(o, line.clone(), style(Color::rgb(255, 0, 0))).unwrap();
        let blue = AnnotationRecord::new(o, line, style(Color::rgb(0, 0, 255))).unwrap();

        let options = RenderOptions::default();
        let img = composite(&base, &[red.clone(), blue.clone()], &options).unwrap();
        assert_eq!(img.get_pixel(30, 30).0, [0, 0, 255, 255]);
        let img = composite(&base, &[blue, red], &options).unwrap();
        assert_eq!(img.get_pixel(30, 30).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_arrow_head_is_painted_near_tip() {
        let base = base(120, 120);
        let arrow = record(Point::new(10.0, 60.0), Shape::Arrow { dx: 90.0, dy: 0.0 });
        let img = composite(&base, &[arrow], &RenderOptions::default()).unwrap();
        // Upper barb passes through roughly (100 - 8.66, 60 - 5)
        assert_ne!(img.get_pixel(91, 55).0, [40, 40, 40, 255]);
        // Nothing far above the shaft
        assert_eq!(img.get_pixel(50, 40).0, [40, 40, 40, 255]);
    }

    #[test]
    fn test_png_output_decodes() {
        let base = base(32, 24);
        let png = render(&base, &all_kinds(), &RenderOptions::default()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_render_state_checks_dimensions() {
        let base = base(32, 24);
        let state = AnnotationState {
            image_width: 64,
            image_height: 48,
            records: all_kinds(),
        };
        assert!(render_state(&base, &state, &RenderOptions::default()).is_err());
    }
}
