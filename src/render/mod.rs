//! Annotation rendering module
//!
//! This module contains:
//! - Geometry calculations for arrow heads, fills and labels
//! - Bitmap text drawing for text and callout labels
//! - Compositing onto the base image using tiny-skia

pub mod geometry;
pub mod image;
pub mod text;
