//! Export of a finished session
//!
//! Saving snapshots the records and hands them to an [`ExportJob`]. The job
//! runs the compositor off the event loop and always produces a payload:
//! when compositing fails, the untouched base image goes out instead.

use std::sync::Arc;

use anyhow::Result;

use crate::capture::image::BaseImage;
use crate::domain::AnnotationState;
use crate::render::image::Compositor;

/// Terminal artifact of a session: composite image plus annotation metadata
#[derive(Clone, Debug, PartialEq)]
pub struct ExportPayload {
    rasterized_image: Vec<u8>,
    mime_type: &'static str,
    annotation_state: AnnotationState,
    prompt: String,
}

impl ExportPayload {
    pub fn rasterized_image(&self) -> &[u8] {
        &self.rasterized_image
    }

    /// Media type of the raster bytes
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn annotation_state(&self) -> &AnnotationState {
        &self.annotation_state
    }

    /// Analysis prompt to submit alongside the image
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn annotation_state_json(&self) -> Result<String> {
        self.annotation_state.to_json()
    }

    /// Split into raster bytes, annotation state and prompt
    pub fn into_parts(self) -> (Vec<u8>, AnnotationState, String) {
        (self.rasterized_image, self.annotation_state, self.prompt)
    }
}

/// Result of a save; the fallback is a successful export too
#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// The annotations were flattened into the image
    Composited(ExportPayload),
    /// Compositing failed; the payload carries the original image bytes
    Fallback {
        payload: ExportPayload,
        warning: String,
    },
}

impl SaveOutcome {
    pub fn payload(&self) -> &ExportPayload {
        match self {
            SaveOutcome::Composited(payload) | SaveOutcome::Fallback { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> ExportPayload {
        match self {
            SaveOutcome::Composited(payload) | SaveOutcome::Fallback { payload, .. } => payload,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SaveOutcome::Fallback { .. })
    }

    /// User-facing warning for the fallback case
    pub fn warning(&self) -> Option<&str> {
        match self {
            SaveOutcome::Composited(_) => None,
            SaveOutcome::Fallback { warning, .. } => Some(warning),
        }
    }
}

/// A save in flight: a frozen copy of everything export needs
pub struct ExportJob {
    base: BaseImage,
    state: AnnotationState,
    prompt: String,
    compositor: Arc<dyn Compositor>,
}

impl ExportJob {
    pub(crate) fn new(
        base: BaseImage,
        state: AnnotationState,
        prompt: String,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            base,
            state,
            prompt,
            compositor,
        }
    }

    /// Records frozen at the moment save was requested
    pub fn annotation_state(&self) -> &AnnotationState {
        &self.state
    }

    /// Composite on the current thread
    pub fn run_blocking(self) -> SaveOutcome {
        match self.compositor.render(&self.base, &self.state.records) {
            Ok(png) => {
                log::info!(
                    "Exported {}x{} composite with {} annotations",
                    self.state.image_width,
                    self.state.image_height,
                    self.state.records.len()
                );
                SaveOutcome::Composited(ExportPayload {
                    rasterized_image: png,
                    mime_type: "image/png",
                    annotation_state: self.state,
                    prompt: self.prompt,
                })
            }
            Err(err) => fallback(&self.base, self.state, self.prompt, format!("{err:#}")),
        }
    }

    /// Composite on tokio's blocking pool so the event loop stays responsive
    ///
    /// Runs to completion once started; a panicking compositor is treated
    /// like any other compositing failure. This relies on panics unwinding,
    /// which the release profile keeps.
    pub async fn run(self) -> SaveOutcome {
        let base = self.base.clone();
        let state = self.state.clone();
        let prompt = self.prompt.clone();
        match tokio::task::spawn_blocking(move || self.run_blocking()).await {
            Ok(outcome) => outcome,
            Err(err) => fallback(&base, state, prompt, format!("compositor aborted: {err}")),
        }
    }
}

fn fallback(
    base: &BaseImage,
    state: AnnotationState,
    prompt: String,
    reason: String,
) -> SaveOutcome {
    log::warn!("Compositing failed, exporting original image instead: {reason}");
    SaveOutcome::Fallback {
        payload: ExportPayload {
            rasterized_image: base.source_bytes().to_vec(),
            mime_type: base.mime_type(),
            annotation_state: state,
            prompt,
        },
        warning: format!(
            "Annotations could not be drawn onto the image ({reason}); \
             the original image was sent with the annotation data"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnotationRecord;
    use crate::render::image::{RenderOptions, SkiaCompositor};
    use image::RgbaImage;

    struct PanickingCompositor;

    impl Compositor for PanickingCompositor {
        fn render(&self, _: &BaseImage, _: &[AnnotationRecord]) -> Result<Vec<u8>> {
            panic!("rasterizer crashed")
        }
    }

    fn job(compositor: Arc<dyn Compositor>) -> ExportJob {
        let base = BaseImage::from_rgba(RgbaImage::new(8, 6));
        let state = AnnotationState {
            image_width: 8,
            image_height: 6,
            records: Vec::new(),
        };
        ExportJob::new(base, state, "describe".to_string(), compositor)
    }

    #[tokio::test]
    async fn test_panicking_compositor_falls_back() {
        let outcome = job(Arc::new(PanickingCompositor)).run().await;

        assert!(outcome.is_fallback());
        assert!(outcome.warning().unwrap().contains("compositor aborted"));
        let payload = outcome.payload();
        assert_eq!(payload.rasterized_image(), vec![0u8; 8 * 6 * 4].as_slice());
        assert_eq!(payload.mime_type(), "application/octet-stream");
        assert_eq!(payload.prompt(), "describe");
    }

    #[tokio::test]
    async fn test_run_composites_on_blocking_pool() {
        let compositor = Arc::new(SkiaCompositor::new(RenderOptions::default()));
        let outcome = job(compositor).run().await;

        assert!(!outcome.is_fallback());
        assert_eq!(outcome.warning(), None);
        let (png, state, prompt) = outcome.into_payload().into_parts();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        assert_eq!((state.image_width, state.records.len()), (8, 0));
        assert_eq!(prompt, "describe");
    }
}
