//! Base image input
//!
//! Acquisition (file pickers, cameras) happens outside the engine; this
//! module only wraps the decoded result.

pub mod image;
