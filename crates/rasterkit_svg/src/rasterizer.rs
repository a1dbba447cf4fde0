use std::sync::Arc;

use log::debug;
use rasterkit_shared::types::Size;
use tiny_skia::{Pixmap, Transform};

use crate::document::SvgDocument;
use crate::errors::SvgError;
use crate::options::SvgOptions;

/// Bytes per pixel of every buffer produced by the rasterizer
pub const BYTES_PER_PIXEL: usize = 4;

/// Row-major RGBA pixels with premultiplied alpha. Rows are tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Premultiplied RGBA value at the given position
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Converts to straight (non-premultiplied) RGBA, as most image encoders expect
    pub fn to_straight_alpha(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        demultiply(&mut out);
        out
    }
}

/// Converts premultiplied RGBA pixels to straight alpha in place
pub fn demultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        let alpha = px[3] as u32;
        if alpha == 0 || alpha == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
}

/// Renders parsed documents into pixel buffers
#[derive(Clone, Debug)]
pub struct Rasterizer {
    options: Arc<SvgOptions>,
}

impl Rasterizer {
    pub fn new(options: Arc<SvgOptions>) -> Self {
        Self { options }
    }

    /// Renders `document` into a fresh `width` x `height` buffer, scaling the document by
    /// `scale_x` and `scale_y` with no translation, rotation or shear.
    pub fn render(
        &self,
        document: &SvgDocument,
        width: u32,
        height: u32,
        scale_x: f64,
        scale_y: f64,
    ) -> Result<PixelBuffer, SvgError> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(SvgError::InvalidSize(format!(
                "cannot render into a {width}x{height} image"
            )));
        }

        let max_dimension = self.options.settings().max_dimension;
        if width > max_dimension || height > max_dimension {
            return Err(SvgError::InvalidSize(format!(
                "output size {width}x{height} exceeds the limit of {max_dimension} pixels per axis"
            )));
        }

        if !valid_scale(scale_x) || !valid_scale(scale_y) {
            return Err(SvgError::InvalidSize(format!(
                "invalid scale {scale_x}x{scale_y}"
            )));
        }

        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            SvgError::InvalidSize(format!("failed to allocate a {width}x{height} pixel buffer"))
        })?;

        let transform = Transform::from_row(scale_x as f32, 0.0, 0.0, scale_y as f32, 0.0, 0.0);
        resvg::render(document.tree(), transform, &mut pixmap.as_mut());

        debug!("svg: rendered {width}x{height} at scale {scale_x}x{scale_y}");

        Ok(PixelBuffer {
            width,
            height,
            data: pixmap.take(),
        })
    }
}

fn valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0 && (scale as f32).is_normal()
}
