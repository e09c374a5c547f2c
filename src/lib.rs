//! Photo annotation engine
//!
//! Pointer gestures in display space become annotation records in image
//! space. Records live in an undoable model and are flattened onto the base
//! image at its native resolution when a session is saved.

pub mod annotations;
pub mod capture;
pub mod config;
pub mod domain;
pub mod render;
pub mod session;

pub use annotations::{AnnotationModel, Tool};
pub use capture::image::BaseImage;
pub use config::EngineConfig;
pub use domain::{AnnotationRecord, AnnotationState, CanvasGeometry, Color, Point, Shape, Style};
pub use render::image::{Compositor, SkiaCompositor};
pub use session::{ExportPayload, PointerEvent, SaveOutcome, Session};
