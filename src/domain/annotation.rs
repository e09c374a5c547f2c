//! Annotation records and their serialized form
//!
//! All coordinates are image-space pixels. The serialized record shape is
//! `{kind, origin, geometry, style}` and is the contract other sessions and
//! the submission side read back, so field names are fixed.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::geometry::Point;

/// RGB color, serialized as `#rrggbb`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            bail!("invalid color {hex:?}");
        }
        let channel = |s: &str| {
            u8::from_str_radix(s, 16).with_context(|| format!("invalid color {hex:?}"))
        };
        match digits.len() {
            3 => {
                let expand = |i: usize| channel(&digits[i..=i].repeat(2));
                Ok(Self::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(anyhow!("invalid color {hex:?}: expected 3 or 6 hex digits")),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

/// Paint style captured when a record is committed
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub color: Color,
    /// Stroke width in image pixels
    pub stroke_width: f32,
}

/// Record kind tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Rectangle,
    Ellipse,
    Arrow,
    Line,
    Curve,
    Polygon,
    Freehand,
    Text,
    Callout,
    Highlight,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 10] = [
        AnnotationKind::Rectangle,
        AnnotationKind::Ellipse,
        AnnotationKind::Arrow,
        AnnotationKind::Line,
        AnnotationKind::Curve,
        AnnotationKind::Polygon,
        AnnotationKind::Freehand,
        AnnotationKind::Text,
        AnnotationKind::Callout,
        AnnotationKind::Highlight,
    ];
}

/// Kind-specific geometry, one payload shape per kind
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Rectangle { width: f32, height: f32 },
    Ellipse { radius: f32 },
    Arrow { dx: f32, dy: f32 },
    Line { dx: f32, dy: f32 },
    /// Smooth curve through the vertices (absolute image coordinates)
    Curve { points: Vec<Point> },
    /// Closed outline through the vertices
    Polygon { points: Vec<Point> },
    /// Sampled pointer path
    Freehand { points: Vec<Point> },
    /// Label drawn with its top-left corner at the record origin, which
    /// `anchor` must repeat
    Text { text: String, anchor: Point },
    /// Boxed label at `anchor` with a leader line back to the record origin
    Callout { text: String, anchor: Point },
    Highlight { width: f32, height: f32 },
}

impl Shape {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Shape::Rectangle { .. } => AnnotationKind::Rectangle,
            Shape::Ellipse { .. } => AnnotationKind::Ellipse,
            Shape::Arrow { .. } => AnnotationKind::Arrow,
            Shape::Line { .. } => AnnotationKind::Line,
            Shape::Curve { .. } => AnnotationKind::Curve,
            Shape::Polygon { .. } => AnnotationKind::Polygon,
            Shape::Freehand { .. } => AnnotationKind::Freehand,
            Shape::Text { .. } => AnnotationKind::Text,
            Shape::Callout { .. } => AnnotationKind::Callout,
            Shape::Highlight { .. } => AnnotationKind::Highlight,
        }
    }

    /// Zero-size boxes, zero radius, zero displacement, blank text and
    /// paths with fewer than two points are degenerate.
    pub fn is_degenerate(&self) -> bool {
        let finite = |v: f32| v.is_finite();
        match self {
            Shape::Rectangle { width, height } | Shape::Highlight { width, height } => {
                !(finite(*width) && finite(*height)) || *width == 0.0 || *height == 0.0
            }
            Shape::Ellipse { radius } => !finite(*radius) || *radius <= 0.0,
            Shape::Arrow { dx, dy } | Shape::Line { dx, dy } => {
                !(finite(*dx) && finite(*dy)) || (*dx == 0.0 && *dy == 0.0)
            }
            Shape::Curve { points } | Shape::Polygon { points } | Shape::Freehand { points } => {
                points.len() < 2 || points.iter().any(|p| !(finite(p.x) && finite(p.y)))
            }
            Shape::Text { text, anchor } | Shape::Callout { text, anchor } => {
                text.trim().is_empty() || !(finite(anchor.x) && finite(anchor.y))
            }
        }
    }
}

/// One committed piece of markup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRepr", try_from = "RecordRepr")]
pub struct AnnotationRecord {
    origin: Point,
    shape: Shape,
    style: Style,
}

impl AnnotationRecord {
    /// Build a record, or `None` when the geometry is degenerate or a text
    /// anchor disagrees with the origin
    pub fn new(origin: Point, shape: Shape, style: Style) -> Option<Self> {
        if shape.is_degenerate() || !origin.x.is_finite() || !origin.y.is_finite() {
            return None;
        }
        if let Shape::Text { anchor, .. } = &shape
            && *anchor != origin
        {
            return None;
        }
        Some(Self {
            origin,
            shape,
            style,
        })
    }

    pub fn kind(&self) -> AnnotationKind {
        self.shape.kind()
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn style(&self) -> Style {
        self.style
    }
}

/// Wire form of a record: `kind` and `geometry` as separate fields
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    kind: AnnotationKind,
    origin: Point,
    geometry: GeometryRepr,
    style: Style,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GeometryRepr {
    Size { width: f32, height: f32 },
    Radius { radius: f32 },
    Delta { dx: f32, dy: f32 },
    Path { points: Vec<Point> },
    Label { text: String, anchor: Point },
}

impl From<AnnotationRecord> for RecordRepr {
    fn from(record: AnnotationRecord) -> Self {
        let kind = record.kind();
        let geometry = match record.shape {
            Shape::Rectangle { width, height } | Shape::Highlight { width, height } => {
                GeometryRepr::Size { width, height }
            }
            Shape::Ellipse { radius } => GeometryRepr::Radius { radius },
            Shape::Arrow { dx, dy } | Shape::Line { dx, dy } => GeometryRepr::Delta { dx, dy },
            Shape::Curve { points } | Shape::Polygon { points } | Shape::Freehand { points } => {
                GeometryRepr::Path { points }
            }
            Shape::Text { text, anchor } | Shape::Callout { text, anchor } => {
                GeometryRepr::Label { text, anchor }
            }
        };
        Self {
            kind,
            origin: record.origin,
            geometry,
            style: record.style,
        }
    }
}

impl TryFrom<RecordRepr> for AnnotationRecord {
    type Error = anyhow::Error;

    fn try_from(repr: RecordRepr) -> Result<Self> {
        use AnnotationKind as K;
        let shape = match (repr.kind, repr.geometry) {
            (K::Rectangle, GeometryRepr::Size { width, height }) => {
                Shape::Rectangle { width, height }
            }
            (K::Highlight, GeometryRepr::Size { width, height }) => {
                Shape::Highlight { width, height }
            }
            (K::Ellipse, GeometryRepr::Radius { radius }) => Shape::Ellipse { radius },
            (K::Arrow, GeometryRepr::Delta { dx, dy }) => Shape::Arrow { dx, dy },
            (K::Line, GeometryRepr::Delta { dx, dy }) => Shape::Line { dx, dy },
            (K::Curve, GeometryRepr::Path { points }) => Shape::Curve { points },
            (K::Polygon, GeometryRepr::Path { points }) => Shape::Polygon { points },
            (K::Freehand, GeometryRepr::Path { points }) => Shape::Freehand { points },
            (K::Text, GeometryRepr::Label { text, anchor }) => {
                if anchor != repr.origin {
                    bail!("text anchor {anchor:?} does not match origin {:?}", repr.origin);
                }
                Shape::Text { text, anchor }
            }
            (K::Callout, GeometryRepr::Label { text, anchor }) => Shape::Callout { text, anchor },
            (kind, _) => bail!("geometry does not match kind {kind:?}"),
        };
        let kind = shape.kind();
        AnnotationRecord::new(repr.origin, shape, repr.style)
            .ok_or_else(|| anyhow!("degenerate {kind:?} record"))
    }
}

/// Serializable annotation state handed out with the composite image
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationState {
    pub image_width: u32,
    pub image_height: u32,
    pub records: Vec<AnnotationRecord>,
}

impl AnnotationState {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize annotation state")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse annotation state")
    }
}
