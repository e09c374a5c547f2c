//! Annotation editing: the record model and the drawing tools
//!
//! This module provides:
//! - The ordered record list with bounded undo/redo (model.rs)
//! - Tool identifiers and the gesture state machine (tools.rs)

pub mod model;
pub mod tools;

pub use model::AnnotationModel;
pub use tools::{GestureKind, Tool, ToolMachine, ToolState};
