//! Input types for an annotation session
//!
//! This module contains:
//! - PointerEvent for raw pointer input in display coordinates
//! - Command for discrete editing commands (buttons, shortcuts)

use crate::annotations::Tool;
use crate::domain::Point;

// ============================================================================
// Pointer Input
// ============================================================================

/// Pointer input in display-space coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Button pressed
    Down(Point),
    /// Pointer moved (pressed or not)
    Move(Point),
    /// Button released
    Up(Point),
    /// Double click, which closes polygon and curve paths
    DoubleClick(Point),
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match *self {
            PointerEvent::Down(p)
            | PointerEvent::Move(p)
            | PointerEvent::Up(p)
            | PointerEvent::DoubleClick(p) => p,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Discrete editing commands
///
/// Clearing all annotations is deliberately absent: it needs a confirmation
/// step and goes through [`Session::clear_all`](super::Session::clear_all).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Undo the last committed annotation
    Undo,
    /// Redo the last undone annotation
    Redo,
    /// Drop the gesture in progress
    CancelGesture,
    /// Close the polygon or curve being drawn
    FinishPath,
    /// Switch the active tool
    SelectTool(Tool),
    /// Composite and export
    Save,
}

impl Command {
    pub fn undo() -> Self {
        Self::Undo
    }
    pub fn redo() -> Self {
        Self::Redo
    }
    pub fn select_tool(tool: Tool) -> Self {
        Self::SelectTool(tool)
    }
}
