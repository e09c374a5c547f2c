//! Drawing tools and the gesture state machine
//!
//! The machine works purely in image space; the session maps pointer
//! positions before they get here. Every completed gesture yields zero or
//! one record, and degenerate gestures are dropped without complaint.

use serde::{Deserialize, Serialize};

use crate::domain::{AnnotationKind, AnnotationRecord, Point, Shape, Style};

/// Drawing tool identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
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

/// How a tool's gesture is built up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Press at the start point, release at the end point
    TwoPoint,
    /// Vertices or samples collected until a terminating input
    Path,
    /// Anchor click followed by modal text entry
    Label,
}

impl Tool {
    pub fn gesture(self) -> GestureKind {
        match self {
            Tool::Rectangle | Tool::Ellipse | Tool::Arrow | Tool::Line | Tool::Highlight => {
                GestureKind::TwoPoint
            }
            Tool::Curve | Tool::Polygon | Tool::Freehand => GestureKind::Path,
            Tool::Text | Tool::Callout => GestureKind::Label,
        }
    }

    /// The record kind this tool produces
    pub fn kind(self) -> AnnotationKind {
        match self {
            Tool::Rectangle => AnnotationKind::Rectangle,
            Tool::Ellipse => AnnotationKind::Ellipse,
            Tool::Arrow => AnnotationKind::Arrow,
            Tool::Line => AnnotationKind::Line,
            Tool::Curve => AnnotationKind::Curve,
            Tool::Polygon => AnnotationKind::Polygon,
            Tool::Freehand => AnnotationKind::Freehand,
            Tool::Text => AnnotationKind::Text,
            Tool::Callout => AnnotationKind::Callout,
            Tool::Highlight => AnnotationKind::Highlight,
        }
    }

    /// Stable string identifier, as used by tool buttons
    pub fn id(self) -> &'static str {
        match self {
            Tool::Rectangle => "rectangle",
            Tool::Ellipse => "ellipse",
            Tool::Arrow => "arrow",
            Tool::Line => "line",
            Tool::Curve => "curve",
            Tool::Polygon => "polygon",
            Tool::Freehand => "freehand",
            Tool::Text => "text",
            Tool::Callout => "callout",
            Tool::Highlight => "highlight",
        }
    }

    /// Look a tool up by identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        [
            Tool::Rectangle,
            Tool::Ellipse,
            Tool::Arrow,
            Tool::Line,
            Tool::Curve,
            Tool::Polygon,
            Tool::Freehand,
            Tool::Text,
            Tool::Callout,
            Tool::Highlight,
        ]
        .into_iter()
        .find(|tool| tool.id().eq_ignore_ascii_case(id))
    }
}

/// Gesture progress
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    #[default]
    Idle,
    AwaitingSecondPoint { start: Point, current: Point },
    AccumulatingPath { points: Vec<Point> },
    AwaitingTextEntry { anchor: Point },
}

/// Active tool, active style and the gesture in progress
#[derive(Debug, Clone)]
pub struct ToolMachine {
    tool: Tool,
    style: Style,
    state: ToolState,
    /// Callout label placement relative to the clicked point
    callout_offset: (f32, f32),
}

impl ToolMachine {
    pub fn new(tool: Tool, style: Style, callout_offset: (f32, f32)) -> Self {
        Self {
            tool,
            style,
            state: ToolState::Idle,
            callout_offset,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ToolState::Idle
    }

    /// Switch tools, dropping any uncommitted gesture first
    pub fn select_tool(&mut self, tool: Tool) {
        if !self.is_idle() {
            log::debug!("Discarding in-progress {:?} gesture on tool switch", self.tool);
        }
        self.state = ToolState::Idle;
        self.tool = tool;
    }

    /// Style used for records committed from now on
    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Abandon the in-progress gesture
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    pub fn pointer_down(&mut self, p: Point) {
        match &mut self.state {
            ToolState::Idle => {
                self.state = match self.tool.gesture() {
                    GestureKind::TwoPoint => ToolState::AwaitingSecondPoint {
                        start: p,
                        current: p,
                    },
                    GestureKind::Path => ToolState::AccumulatingPath { points: vec![p] },
                    GestureKind::Label => ToolState::AwaitingTextEntry { anchor: p },
                };
            }
            ToolState::AccumulatingPath { points } if self.tool != Tool::Freehand => {
                push_distinct(points, p);
            }
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, p: Point) {
        match &mut self.state {
            ToolState::AwaitingSecondPoint { current, .. } => *current = p,
            ToolState::AccumulatingPath { points } if self.tool == Tool::Freehand => {
                push_distinct(points, p);
            }
            _ => {}
        }
    }

    /// Release ends two-point and freehand gestures
    pub fn pointer_up(&mut self, p: Point) -> Option<AnnotationRecord> {
        match &mut self.state {
            ToolState::AwaitingSecondPoint { start, .. } => {
                let start = *start;
                self.state = ToolState::Idle;
                self.two_point_record(start, p)
            }
            ToolState::AccumulatingPath { points } if self.tool == Tool::Freehand => {
                push_distinct(points, p);
                self.finish_path()
            }
            _ => None,
        }
    }

    /// Terminate a vertex path (double-click or Enter)
    pub fn finish_path(&mut self) -> Option<AnnotationRecord> {
        if !matches!(self.state, ToolState::AccumulatingPath { .. }) {
            return None;
        }
        let ToolState::AccumulatingPath { points } = std::mem::take(&mut self.state) else {
            return None;
        };
        let origin = *points.first()?;
        let shape = match self.tool {
            Tool::Curve => Shape::Curve { points },
            Tool::Polygon => Shape::Polygon { points },
            Tool::Freehand => Shape::Freehand { points },
            _ => return None,
        };
        self.build(origin, shape)
    }

    /// Resolve a pending text entry; `None` means the entry was cancelled
    pub fn submit_text(&mut self, text: Option<&str>) -> Option<AnnotationRecord> {
        let ToolState::AwaitingTextEntry { anchor } = self.state else {
            return None;
        };
        self.state = ToolState::Idle;
        let text = text?.trim().to_string();
        let shape = match self.tool {
            Tool::Text => Shape::Text { text, anchor },
            Tool::Callout => Shape::Callout {
                text,
                anchor: anchor.offset(self.callout_offset.0, self.callout_offset.1),
            },
            _ => return None,
        };
        self.build(anchor, shape)
    }

    /// The gesture in progress as a provisional record, for rubber-band display
    pub fn preview(&self) -> Option<AnnotationRecord> {
        match &self.state {
            ToolState::AwaitingSecondPoint { start, current } => {
                self.two_point_record(*start, *current)
            }
            ToolState::AccumulatingPath { points } => {
                let shape = match self.tool {
                    Tool::Curve => Shape::Curve {
                        points: points.clone(),
                    },
                    Tool::Polygon => Shape::Polygon {
                        points: points.clone(),
                    },
                    Tool::Freehand => Shape::Freehand {
                        points: points.clone(),
                    },
                    _ => return None,
                };
                AnnotationRecord::new(*points.first()?, shape, self.style)
            }
            _ => None,
        }
    }

    fn two_point_record(&self, start: Point, end: Point) -> Option<AnnotationRecord> {
        let (dx, dy) = start.delta_to(end);
        let shape = match self.tool {
            Tool::Rectangle => Shape::Rectangle {
                width: dx,
                height: dy,
            },
            Tool::Highlight => Shape::Highlight {
                width: dx,
                height: dy,
            },
            Tool::Ellipse => Shape::Ellipse {
                radius: start.distance(end),
            },
            Tool::Arrow => Shape::Arrow { dx, dy },
            Tool::Line => Shape::Line { dx, dy },
            _ => return None,
        };
        AnnotationRecord::new(start, shape, self.style)
    }

    fn build(&self, origin: Point, shape: Shape) -> Option<AnnotationRecord> {
        let record = AnnotationRecord::new(origin, shape, self.style);
        if record.is_none() {
            log::debug!("Dropping degenerate {:?} gesture", self.tool);
        }
        record
    }
}

fn push_distinct(points: &mut Vec<Point>, p: Point) {
    if points.last() != Some(&p) {
        points.push(p);
    }
}
