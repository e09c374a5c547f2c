//! Base image type handed to the engine by the acquisition side

use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;

/// A decoded base image together with the bytes it came from
///
/// Cheap to clone; pixel data and source bytes are shared.
#[derive(Clone, Debug)]
pub struct BaseImage {
    rgba: Arc<RgbaImage>,
    source: Arc<[u8]>,
    mime_type: &'static str,
}

impl BaseImage {
    /// Decode an encoded image (PNG, JPEG), keeping the original bytes
    pub fn decode(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let source: Arc<[u8]> = bytes.into();
        let format = image::guess_format(&source).context("Unrecognized image format")?;
        let rgba = image::load_from_memory_with_format(&source, format)
            .context("Failed to decode base image")?
            .to_rgba8();
        log::debug!(
            "BaseImage decoded: {}x{} pixels ({:?})",
            rgba.width(),
            rgba.height(),
            format
        );
        Ok(Self {
            rgba: Arc::new(rgba),
            source,
            mime_type: format.to_mime_type(),
        })
    }

    /// Wrap raw RGBA8 pixels; the raw buffer doubles as the source bytes
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let rgba = RgbaImage::from_raw(width, height, pixels).with_context(|| {
            format!("Pixel buffer does not hold a {width}x{height} RGBA image")
        })?;
        Ok(Self::from_rgba(rgba))
    }

    pub fn from_rgba(rgba: RgbaImage) -> Self {
        let source: Arc<[u8]> = rgba.as_raw().as_slice().into();
        Self {
            rgba: Arc::new(rgba),
            source,
            mime_type: RAW_RGBA_MIME,
        }
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    /// The unmodified bytes this image was created from
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Media type of [`source_bytes`](Self::source_bytes)
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }
}

/// Media type used for raw, unencoded RGBA8 source buffers
pub const RAW_RGBA_MIME: &str = "application/octet-stream";
