//! Points and the display/image coordinate mapping
//!
//! Records always store image-space coordinates. Display space is whatever
//! size the canvas is shown at, which may be scaled down from the image.

use serde::{Deserialize, Serialize};

/// A point in either display or image space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Displacement from `self` to `other`
    pub fn delta_to(self, other: Point) -> (f32, f32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn offset(self, dx: f32, dy: f32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// Display and image dimensions of the canvas
///
/// Fixed once the base image is loaded. The mapper methods never clamp, so
/// callers must reject out-of-bounds input themselves (see [`contains_display`]).
///
/// [`contains_display`]: CanvasGeometry::contains_display
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasGeometry {
    pub display_width: f32,
    pub display_height: f32,
    pub image_width: u32,
    pub image_height: u32,
}

impl CanvasGeometry {
    /// Create a geometry from explicit display and image sizes
    ///
    /// Returns `None` if any dimension is zero or not finite.
    pub fn new(
        display_width: f32,
        display_height: f32,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let valid_display = display_width.is_finite()
            && display_height.is_finite()
            && display_width > 0.0
            && display_height > 0.0;
        if !valid_display || image_width == 0 || image_height == 0 {
            return None;
        }
        Some(Self {
            display_width,
            display_height,
            image_width,
            image_height,
        })
    }

    /// Fit an image into a maximum display box, keeping its aspect ratio
    ///
    /// Images smaller than the box are shown at native size.
    pub fn fit(
        image_width: u32,
        image_height: u32,
        max_width: f32,
        max_height: f32,
    ) -> Option<Self> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        let (w, h) = (image_width as f32, image_height as f32);
        let scale = (max_width / w).min(max_height / h).min(1.0);
        Self::new(w * scale, h * scale, image_width, image_height)
    }

    /// Horizontal image pixels per display unit
    pub fn scale_x(&self) -> f32 {
        self.image_width as f32 / self.display_width
    }

    /// Vertical image pixels per display unit
    pub fn scale_y(&self) -> f32 {
        self.image_height as f32 / self.display_height
    }

    pub fn to_image_space(&self, display: Point) -> Point {
        Point::new(display.x * self.scale_x(), display.y * self.scale_y())
    }

    pub fn to_display_space(&self, image: Point) -> Point {
        Point::new(image.x / self.scale_x(), image.y / self.scale_y())
    }

    /// Whether a display-space point lies inside the displayed canvas
    pub fn contains_display(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.display_width && p.y <= self.display_height
    }
}
