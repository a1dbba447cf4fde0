//! Image loader surface for image decoding pipelines.
//!
//! A pipeline asks a factory for a loader per input stream and then requests frames from it.
//! SVG sources always have exactly one frame.

use std::io::{self, Read};
use std::sync::Arc;

use log::debug;
use rasterkit_shared::types::Size;

use crate::errors::SvgError;
use crate::geometry::{negotiate_dimensions, scale_factors};
use crate::registry::{DocumentHandle, DocumentRegistry};

/// Pixel layout of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// 4 bytes per pixel, RGBA, color channels premultiplied by alpha
    RgbaPremultiplied,
}

/// Metadata attached to a frame. Vector images have no animation attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageMetadata {
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub delay_time: Option<u32>,
    pub loop_count: Option<u32>,
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub image_type: ImageType,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixel_scale: f32,
    pub metadata: ImageMetadata,
}

/// Describes a format a loader factory can decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFormatDescription {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub mime_types: &'static [&'static str],
}

pub trait ImageLoader {
    /// Decodes frame `image_index`, or returns `Ok(None)` when there is no such frame.
    ///
    /// `width` and `height` are the requested size in logical pixels, zero meaning "derive".
    /// `pixel_scale` is the device pixel ratio the frame is rendered for.
    fn load(
        &mut self,
        image_index: usize,
        width: f64,
        height: f64,
        preserve_aspect_ratio: bool,
        smooth: bool,
        pixel_scale: f32,
    ) -> io::Result<Option<ImageFrame>>;

    /// Releases the resources held by the loader. Later loads return `Ok(None)`.
    fn dispose(&mut self);
}

pub trait ImageLoaderFactory {
    fn format_description(&self) -> &ImageFormatDescription;

    fn create_image_loader(&self, input: &mut dyn Read) -> io::Result<Box<dyn ImageLoader>>;
}

const SVG_FORMAT: ImageFormatDescription = ImageFormatDescription {
    name: "SVG",
    extensions: &["svg", "svgz"],
    mime_types: &["image/svg+xml"],
};

/// Loader for a single SVG document. The document is released on `dispose()` or drop.
pub struct SvgImageLoader {
    registry: Arc<DocumentRegistry>,
    handle: Option<DocumentHandle>,
}

impl SvgImageLoader {
    /// Reads the whole input and parses it
    pub fn new(registry: Arc<DocumentRegistry>, input: &mut dyn Read) -> io::Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        let handle = registry.parse(&data)?;
        Ok(Self {
            registry,
            handle: Some(handle),
        })
    }

    pub fn handle(&self) -> Option<DocumentHandle> {
        self.handle
    }
}

impl ImageLoader for SvgImageLoader {
    fn load(
        &mut self,
        image_index: usize,
        width: f64,
        height: f64,
        preserve_aspect_ratio: bool,
        _smooth: bool,
        pixel_scale: f32,
    ) -> io::Result<Option<ImageFrame>> {
        let Some(handle) = self.handle else {
            return Ok(None);
        };
        if image_index > 0 {
            return Ok(None);
        }

        if !(pixel_scale.is_finite() && pixel_scale > 0.0) {
            return Err(SvgError::InvalidSize(format!("invalid pixel scale {pixel_scale}")).into());
        }
        let scale = f64::from(pixel_scale);

        let intrinsic = self.registry.intrinsic_size(handle)?;
        let output = negotiate_dimensions(
            intrinsic.scale(scale),
            Size::new(width, height).scale(scale),
            preserve_aspect_ratio,
        );
        let (scale_x, scale_y) = scale_factors(intrinsic, output);

        let buffer = self
            .registry
            .render(handle, output.width, output.height, scale_x, scale_y)?;

        debug!(
            "loader: decoded {}x{} frame at pixel scale {pixel_scale}",
            buffer.width(),
            buffer.height()
        );

        Ok(Some(ImageFrame {
            image_type: ImageType::RgbaPremultiplied,
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            pixel_scale,
            metadata: ImageMetadata {
                image_width: Some(buffer.width()),
                image_height: Some(buffer.height()),
                ..Default::default()
            },
            pixels: buffer.into_vec(),
        }))
    }

    fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            // the handle is owned by this loader, so it is always registered here
            let _ = self.registry.dispose(handle);
        }
    }
}

impl Drop for SvgImageLoader {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Creates [`SvgImageLoader`]s that all share one registry
pub struct SvgImageLoaderFactory {
    registry: Arc<DocumentRegistry>,
}

impl SvgImageLoaderFactory {
    pub fn new(registry: Arc<DocumentRegistry>) -> Self {
        Self { registry }
    }
}

impl Default for SvgImageLoaderFactory {
    fn default() -> Self {
        Self::new(DocumentRegistry::global())
    }
}

impl ImageLoaderFactory for SvgImageLoaderFactory {
    fn format_description(&self) -> &ImageFormatDescription {
        &SVG_FORMAT
    }

    fn create_image_loader(&self, input: &mut dyn Read) -> io::Result<Box<dyn ImageLoader>> {
        Ok(Box::new(SvgImageLoader::new(self.registry.clone(), input)?))
    }
}
