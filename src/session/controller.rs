//! The annotation session: one owned state object driven by input events
//!
//! A session owns the canvas geometry, the record model and the tool state
//! machine. Pointer positions arrive in display space and are mapped to image
//! space before any geometry is derived from them.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use super::export::ExportJob;
use super::messages::{Command, PointerEvent};
use super::shortcuts::{self, Key, Modifiers};
use crate::annotations::{AnnotationModel, GestureKind, Tool, ToolMachine, ToolState};
use crate::capture::image::BaseImage;
use crate::config::EngineConfig;
use crate::domain::{AnnotationRecord, AnnotationState, CanvasGeometry, Color, Point, Style};
use crate::render::image::{Compositor, SkiaCompositor};

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, no base image yet; input is ignored
    AwaitingImage,
    /// Image loaded, gestures accepted
    Editing,
    /// Save was requested; the session no longer accepts input
    Exported,
    /// Discarded without export
    Cancelled,
}

pub struct Session {
    config: EngineConfig,
    prompt: String,
    base: Option<BaseImage>,
    canvas: Option<CanvasGeometry>,
    model: AnnotationModel,
    tools: ToolMachine,
    compositor: Arc<dyn Compositor>,
    phase: SessionPhase,
}

impl Session {
    /// Start an empty session
    ///
    /// `prompt` is the free-text analysis prompt passed through to the
    /// export; an empty prompt is replaced by the configured default.
    pub fn new(config: EngineConfig, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let prompt = if prompt.trim().is_empty() {
            config.default_prompt.clone()
        } else {
            prompt
        };
        let tools = ToolMachine::new(
            config.default_tool,
            config.default_style(),
            config.callout_offset,
        );
        Self {
            model: AnnotationModel::with_history_limit(config.history_limit),
            compositor: Arc::new(SkiaCompositor::new(config.render_options())),
            tools,
            prompt,
            base: None,
            canvas: None,
            phase: SessionPhase::AwaitingImage,
            config,
        }
    }

    /// Use a different compositor for export
    pub fn with_compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = compositor;
        self
    }

    /// Load the base image, fitting it into the configured display box
    pub fn load_image(&mut self, base: BaseImage) -> Result<CanvasGeometry> {
        let canvas = CanvasGeometry::fit(
            base.width(),
            base.height(),
            self.config.display_max_width,
            self.config.display_max_height,
        )
        .context("Base image has no pixels")?;
        self.install(base, canvas)
    }

    /// Load the base image shown at an explicit display size
    pub fn load_image_with_display(
        &mut self,
        base: BaseImage,
        display_width: f32,
        display_height: f32,
    ) -> Result<CanvasGeometry> {
        let canvas =
            CanvasGeometry::new(display_width, display_height, base.width(), base.height())
                .context("Invalid display or image size")?;
        self.install(base, canvas)
    }

    fn install(&mut self, base: BaseImage, canvas: CanvasGeometry) -> Result<CanvasGeometry> {
        if self.phase != SessionPhase::AwaitingImage {
            bail!("Session already has a base image");
        }
        log::info!(
            "Loaded {}x{} image, display {}x{}",
            canvas.image_width,
            canvas.image_height,
            canvas.display_width,
            canvas.display_height
        );
        self.base = Some(base);
        self.canvas = Some(canvas);
        self.phase = SessionPhase::Editing;
        Ok(canvas)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn canvas(&self) -> Option<CanvasGeometry> {
        self.canvas
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        self.model.records()
    }

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn style(&self) -> Style {
        self.tools.style()
    }

    pub fn tool_state(&self) -> &ToolState {
        self.tools.state()
    }

    pub fn can_undo(&self) -> bool {
        self.editable() && self.model.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.editable() && self.model.can_redo()
    }

    /// True while a gesture has started but not committed
    pub fn is_drawing(&self) -> bool {
        !self.tools.is_idle()
    }

    fn editable(&self) -> bool {
        self.phase == SessionPhase::Editing
    }

    /// Route a pointer event; returns true if it committed a record
    pub fn pointer(&mut self, event: PointerEvent) -> bool {
        let Some(canvas) = self.canvas.filter(|_| self.editable()) else {
            return false;
        };
        let display = event.position();
        let inside = canvas.contains_display(display);
        let p = canvas.to_image_space(display);

        let committed = match event {
            PointerEvent::Down(_) => {
                if inside {
                    self.tools.pointer_down(p);
                } else {
                    log::debug!("Ignoring pointer down outside canvas at {:?}", display);
                }
                None
            }
            PointerEvent::Move(_) => {
                if inside {
                    self.tools.pointer_move(p);
                }
                None
            }
            PointerEvent::Up(_) => {
                if inside {
                    self.tools.pointer_up(p)
                } else {
                    self.abandon_released_gesture();
                    None
                }
            }
            PointerEvent::DoubleClick(_) => self.tools.finish_path(),
        };
        self.commit(committed)
    }

    /// Releasing outside the canvas drops drag gestures; click-built paths survive it
    fn abandon_released_gesture(&mut self) {
        let drag = match self.tools.tool().gesture() {
            GestureKind::TwoPoint => true,
            GestureKind::Path => self.tools.tool() == Tool::Freehand,
            GestureKind::Label => false,
        };
        if drag && !self.tools.is_idle() {
            log::debug!("Pointer released outside canvas, dropping gesture");
            self.tools.cancel();
        }
    }

    fn commit(&mut self, record: Option<AnnotationRecord>) -> bool {
        match record {
            Some(record) => {
                self.model.append(record);
                true
            }
            None => false,
        }
    }

    /// Resolve a pending text or callout entry; `None` cancels it
    pub fn submit_text(&mut self, text: Option<&str>) -> bool {
        if !self.editable() {
            return false;
        }
        let record = self.tools.submit_text(text);
        self.commit(record)
    }

    /// Close the polygon or curve in progress
    pub fn finish_path(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        let record = self.tools.finish_path();
        self.commit(record)
    }

    pub fn cancel_gesture(&mut self) {
        self.tools.cancel();
    }

    /// The gesture in progress as a provisional record (image space)
    pub fn preview(&self) -> Option<AnnotationRecord> {
        if !self.editable() {
            return None;
        }
        self.tools.preview()
    }

    pub fn undo(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        // An unfinished gesture is dropped rather than undoing behind it
        self.tools.cancel();
        let undone = self.model.undo();
        if undone {
            log::debug!("Undo, {} annotations remain", self.model.len());
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        self.tools.cancel();
        let redone = self.model.redo();
        if redone {
            log::debug!("Redo, {} annotations", self.model.len());
        }
        redone
    }

    /// Remove every annotation after confirmation; this cannot be undone
    ///
    /// `confirm` receives the number of records about to be removed and is
    /// only asked when there is something to clear.
    pub fn clear_all(&mut self, confirm: impl FnOnce(usize) -> bool) -> bool {
        if !self.editable() || self.model.is_empty() {
            return false;
        }
        if !confirm(self.model.len()) {
            return false;
        }
        log::info!("Clearing {} annotations", self.model.len());
        self.tools.cancel();
        self.model.clear();
        true
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.tools.select_tool(tool);
    }

    /// Select a tool by its identifier; unknown identifiers are ignored
    pub fn select_tool_id(&mut self, id: &str) -> bool {
        match Tool::from_id(id) {
            Some(tool) => {
                self.select_tool(tool);
                true
            }
            None => {
                log::warn!("Unknown tool {:?}", id);
                false
            }
        }
    }

    /// Set the color for annotations drawn from now on
    pub fn select_color(&mut self, hex: &str) -> Result<()> {
        let color = Color::from_hex(hex)?;
        let style = Style {
            color,
            ..self.tools.style()
        };
        self.tools.set_style(style);
        Ok(())
    }

    /// Set the stroke width for annotations drawn from now on
    pub fn select_stroke_width(&mut self, width: f32) -> bool {
        if !(width.is_finite() && width > 0.0) {
            log::warn!("Ignoring invalid stroke width {}", width);
            return false;
        }
        let style = Style {
            stroke_width: width,
            ..self.tools.style()
        };
        self.tools.set_style(style);
        true
    }

    /// Apply a discrete command; `Save` yields the export job
    pub fn apply(&mut self, command: Command) -> Option<ExportJob> {
        match command {
            Command::Undo => {
                self.undo();
            }
            Command::Redo => {
                self.redo();
            }
            Command::CancelGesture => self.cancel_gesture(),
            Command::FinishPath => {
                self.finish_path();
            }
            Command::SelectTool(tool) => self.select_tool(tool),
            Command::Save => return self.save(),
        }
        None
    }

    /// Route a key press through the shortcut table
    pub fn handle_key(&mut self, key: Key, modifiers: Modifiers) -> Option<ExportJob> {
        let command = shortcuts::handle_key_event(key, modifiers, self.is_drawing())?;
        self.apply(command)
    }

    /// Freeze the records and start export
    ///
    /// The session stops accepting input from here on, so nothing drawn after
    /// this call can leak into the payload. Returns `None` if there is no
    /// image or the session already ended.
    pub fn save(&mut self) -> Option<ExportJob> {
        if !self.editable() {
            return None;
        }
        let base = self.base.clone()?;
        self.tools.cancel();
        let state = AnnotationState {
            image_width: base.width(),
            image_height: base.height(),
            records: self.model.snapshot(),
        };
        self.phase = SessionPhase::Exported;
        log::info!("Saving session with {} annotations", state.records.len());
        Some(ExportJob::new(
            base,
            state,
            self.prompt.clone(),
            Arc::clone(&self.compositor),
        ))
    }

    /// Discard the session without exporting
    pub fn cancel(&mut self) {
        if self.phase == SessionPhase::Exported {
            return;
        }
        log::info!("Session cancelled");
        self.tools.cancel();
        self.model.clear();
        self.base = None;
        self.canvas = None;
        self.phase = SessionPhase::Cancelled;
    }

    /// Display position of an image-space point, for drawing overlays
    pub fn to_display(&self, image: Point) -> Option<Point> {
        self.canvas.map(|canvas| canvas.to_display_space(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Shape;
    use anyhow::anyhow;
    use image::RgbaImage;

    fn loaded_session() -> Session {
        let mut session = Session::new(EngineConfig::default(), "what is this?");
        let base = BaseImage::from_rgba(RgbaImage::from_pixel(
            800,
            600,
            image::Rgba([200, 200, 200, 255]),
        ));
        session
            .load_image_with_display(base, 400.0, 300.0)
            .unwrap();
        session
    }

    fn drag(session: &mut Session, from: (f32, f32), to: (f32, f32)) -> bool {
        session.pointer(PointerEvent::Down(Point::new(from.0, from.1)));
        session.pointer(PointerEvent::Move(Point::new(to.0, to.1)));
        session.pointer(PointerEvent::Up(Point::new(to.0, to.1)))
    }

    struct FailingCompositor;

    impl Compositor for FailingCompositor {
        fn render(&self, _: &BaseImage, _: &[AnnotationRecord]) -> Result<Vec<u8>> {
            Err(anyhow!("out of memory"))
        }
    }

    #[test]
    fn test_input_ignored_before_load() {
        let mut session = Session::new(EngineConfig::default(), "");
        assert_eq!(session.phase(), SessionPhase::AwaitingImage);
        assert!(!drag(&mut session, (1.0, 1.0), (20.0, 20.0)));
        assert!(session.records().is_empty());
        assert!(session.save().is_none());
        assert_eq!(session.prompt(), EngineConfig::default().default_prompt);
    }

    #[test]
    fn test_second_load_is_rejected() {
        let mut session = loaded_session();
        let other = BaseImage::from_rgba(RgbaImage::new(10, 10));
        assert!(session.load_image(other).is_err());
        assert_eq!(session.canvas().unwrap().image_width, 800);
    }

    #[test]
    fn test_load_fits_display_box() {
        let mut session = Session::new(EngineConfig::default(), "");
        let canvas = session
            .load_image(BaseImage::from_rgba(RgbaImage::new(1600, 900)))
            .unwrap();
        assert_eq!((canvas.display_width, canvas.display_height), (800.0, 450.0));
    }

    #[test]
    fn test_gesture_points_are_mapped_to_image_space() {
        let mut session = loaded_session();
        session.select_tool(Tool::Arrow);
        assert!(drag(&mut session, (10.0, 10.0), (60.0, 35.0)));
        let record = &session.records()[0];
        assert_eq!(record.origin(), Point::new(20.0, 20.0));
        assert_eq!(
            record.shape(),
            &Shape::Arrow {
                dx: 100.0,
                dy: 50.0
            }
        );
    }

    #[test]
    fn test_out_of_bounds_gestures() {
        let mut session = loaded_session();
        // Press outside: nothing starts
        assert!(!drag(&mut session, (-5.0, 10.0), (50.0, 50.0)));
        assert!(session.tools.is_idle());
        // Release outside: the drag is dropped
        assert!(!drag(&mut session, (10.0, 10.0), (500.0, 50.0)));
        assert!(session.tools.is_idle());
        assert!(session.records().is_empty());
    }

    #[test]
    fn test_polygon_survives_release_outside() {
        let mut session = loaded_session();
        session.select_tool(Tool::Polygon);
        session.pointer(PointerEvent::Down(Point::new(10.0, 10.0)));
        session.pointer(PointerEvent::Up(Point::new(450.0, 10.0)));
        session.pointer(PointerEvent::Down(Point::new(50.0, 10.0)));
        session.pointer(PointerEvent::Down(Point::new(50.0, 50.0)));
        assert!(session.pointer(PointerEvent::DoubleClick(Point::new(50.0, 50.0))));
        let Shape::Polygon { points } = session.records()[0].shape() else {
            panic!("expected polygon");
        };
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], Point::new(100.0, 100.0));
    }

    #[test]
    fn test_text_entry_flow() {
        let mut session = loaded_session();
        assert!(session.select_tool_id("Callout"));
        session.pointer(PointerEvent::Down(Point::new(100.0, 100.0)));
        session.pointer(PointerEvent::Up(Point::new(100.0, 100.0)));
        assert!(matches!(
            session.tool_state(),
            ToolState::AwaitingTextEntry { .. }
        ));
        assert!(session.submit_text(Some("dent")));
        assert_eq!(session.records()[0].origin(), Point::new(200.0, 200.0));

        session.pointer(PointerEvent::Down(Point::new(10.0, 10.0)));
        assert!(!session.submit_text(None));
        assert_eq!(session.records().len(), 1);
    }

    #[test]
    fn test_color_applies_to_new_records_only() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        session.select_color("#00ff00").unwrap();
        assert!(session.select_color("green").is_err());
        drag(&mut session, (30.0, 30.0), (40.0, 40.0));

        let colors: Vec<_> = session.records().iter().map(|r| r.style().color).collect();
        assert_eq!(colors, [Color::rgb(229, 26, 26), Color::rgb(0, 255, 0)]);
    }

    #[test]
    fn test_stroke_width_selection() {
        let mut session = loaded_session();
        assert!(!session.select_stroke_width(0.0));
        assert!(!session.select_stroke_width(f32::INFINITY));
        assert!(session.select_stroke_width(6.5));
        assert_eq!(session.style().stroke_width, 6.5);
    }

    #[test]
    fn test_undo_drops_unfinished_gesture() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        session.pointer(PointerEvent::Down(Point::new(50.0, 50.0)));
        assert!(session.undo());
        assert!(session.records().is_empty());
        assert!(!session.pointer(PointerEvent::Up(Point::new(90.0, 90.0))));
    }

    #[test]
    fn test_keyboard_drives_session() {
        let mut session = loaded_session();
        session.handle_key(Key::Character('p'), Modifiers::NONE);
        assert_eq!(session.tool(), Tool::Polygon);

        session.pointer(PointerEvent::Down(Point::new(10.0, 10.0)));
        session.pointer(PointerEvent::Down(Point::new(60.0, 10.0)));
        session.pointer(PointerEvent::Down(Point::new(60.0, 60.0)));
        // Tool letters are ignored mid-gesture
        session.handle_key(Key::Character('r'), Modifiers::NONE);
        assert_eq!(session.tool(), Tool::Polygon);
        assert!(session.handle_key(Key::Enter, Modifiers::NONE).is_none());
        assert_eq!(session.records().len(), 1);

        session.handle_key(Key::Character('z'), Modifiers::control());
        assert!(session.records().is_empty());
        session.handle_key(Key::Character('y'), Modifiers::control());
        assert_eq!(session.records().len(), 1);

        let job = session.handle_key(Key::Enter, Modifiers::control()).unwrap();
        assert_eq!(job.annotation_state().records.len(), 1);
    }

    #[test]
    fn test_clear_all_gate() {
        let mut session = loaded_session();
        let mut asked = false;
        assert!(!session.clear_all(|_| {
            asked = true;
            true
        }));
        assert!(!asked);

        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        drag(&mut session, (30.0, 30.0), (40.0, 40.0));
        assert!(!session.clear_all(|_| false));
        assert_eq!(session.records().len(), 2);

        assert!(session.clear_all(|count| count == 2));
        assert!(session.records().is_empty());
        assert!(!session.undo());
        assert!(!session.redo());
    }

    #[test]
    fn test_save_freezes_session() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        let job = session.apply(Command::Save).unwrap();
        assert_eq!(session.phase(), SessionPhase::Exported);

        // Input after save does not reach the frozen snapshot
        assert!(!drag(&mut session, (30.0, 30.0), (40.0, 40.0)));
        assert!(!session.undo());
        assert!(session.save().is_none());
        assert_eq!(job.annotation_state().records.len(), 1);
        assert_eq!(session.records().len(), 1);
    }

    #[test]
    fn test_compositor_failure_falls_back_to_original() {
        let mut session = loaded_session().with_compositor(Arc::new(FailingCompositor));
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        let outcome = session.save().unwrap().run_blocking();

        assert!(outcome.is_fallback());
        assert!(outcome.warning().unwrap().contains("out of memory"));
        let payload = outcome.payload();
        assert_eq!(payload.rasterized_image().len(), 800 * 600 * 4);
        assert_eq!(payload.annotation_state().records.len(), 1);
        assert_eq!(payload.prompt(), "what is this?");
    }

    #[test]
    fn test_cancel_discards_everything() {
        let mut session = loaded_session();
        drag(&mut session, (10.0, 10.0), (20.0, 20.0));
        session.cancel();
        assert_eq!(session.phase(), SessionPhase::Cancelled);
        assert!(session.records().is_empty());
        assert!(session.canvas().is_none());
        assert!(session.save().is_none());
    }
}
