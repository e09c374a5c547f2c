//! Pure domain types with minimal dependencies
//!
//! This module contains the annotation record types and the coordinate
//! mapping shared by the tools, the model and the compositor.

pub mod annotation;
pub mod geometry;

pub use annotation::*;
pub use geometry::*;
