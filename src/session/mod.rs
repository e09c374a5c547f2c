//! Annotation session management
//!
//! This module contains:
//! - The session controller owning canvas, model and tool state
//! - Input types for pointer events and discrete commands
//! - Keyboard shortcut mapping
//! - Export with fallback to the original image

pub mod controller;
pub mod export;
pub mod messages;
pub mod shortcuts;

pub use controller::{Session, SessionPhase};
pub use export::{ExportJob, ExportPayload, SaveOutcome};
pub use messages::{Command, PointerEvent};
pub use shortcuts::{Key, Modifiers};
