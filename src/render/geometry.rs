//! Shared geometry calculations for annotations
//!
//! Constants and math used by the compositor. All values are image pixels.

/// Arrow geometry constants
pub mod arrow {
    /// Barb angle from the shaft in radians (30 degrees)
    pub const BARB_ANGLE: f32 = std::f32::consts::FRAC_PI_6;
    /// Barb length in image pixels
    pub const BARB_LENGTH: f32 = 20.0;

    /// Calculate the two barb end points for an arrow tip at `end`
    ///
    /// Returns `(barb1_x, barb1_y, barb2_x, barb2_y)`, or `None` for a
    /// zero-length shaft which has no direction.
    pub fn barb_points(
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
        barb_length: f32,
    ) -> Option<(f32, f32, f32, f32)> {
        let dx = end_x - start_x;
        let dy = end_y - start_y;
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let angle = dy.atan2(dx);

        // Barbs point back along the shaft, rotated either side of it
        let back = angle + std::f32::consts::PI;
        let (sin1, cos1) = (back - BARB_ANGLE).sin_cos();
        let (sin2, cos2) = (back + BARB_ANGLE).sin_cos();

        Some((
            end_x + cos1 * barb_length,
            end_y + sin1 * barb_length,
            end_x + cos2 * barb_length,
            end_y + sin2 * barb_length,
        ))
    }
}

/// Box and circle constants
pub mod shape {
    /// Fill opacity for rectangles and ellipses
    pub const FILL_ALPHA: u8 = 51; // 20%
    /// Fill opacity for highlights
    pub const HIGHLIGHT_FILL_ALPHA: u8 = 102; // 40%
    /// Stroke opacity for highlights
    pub const HIGHLIGHT_STROKE_ALPHA: u8 = 178; // 70%

    /// Ellipse bezier approximation constant: 4/3 * (sqrt(2) - 1)
    pub const BEZIER_K: f32 = 0.552_284_8;
}

/// Text and callout constants
pub mod label {
    /// Glyph cell size of the bitmap font before scaling
    pub const GLYPH_SIZE: u32 = 8;
    /// Padding around callout text, in glyph pixels
    pub const CALLOUT_PADDING: u32 = 2;
    /// Callout box fill opacity
    pub const CALLOUT_FILL_ALPHA: u8 = 230;
}

/// Normalize min/max coordinates from arbitrary start/end points
#[inline]
pub fn normalize_rect(x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
    let (min_x, max_x) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
    let (min_y, max_y) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
    (min_x, min_y, max_x, max_y)
}

/// Midpoint between two points, used as the on-curve knot for smoothed paths
#[inline]
pub fn midpoint(x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32) {
    ((x1 + x2) * 0.5, (y1 + y2) * 0.5)
}
