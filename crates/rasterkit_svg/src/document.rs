use log::{debug, trace};
use rasterkit_shared::types::Size;
use resvg::usvg;

use std::io::Read;

use crate::errors::SvgError;
use crate::options::SvgOptions;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A parsed SVG document.
///
/// The input bytes are only borrowed while parsing; the document owns everything it needs to be
/// rendered afterwards.
pub struct SvgDocument {
    tree: usvg::Tree,
    intrinsic_size: Size<f64>,
}

impl SvgDocument {
    /// Parses plain or gzip-compressed SVG markup
    pub fn parse(data: &[u8], options: &SvgOptions) -> Result<Self, SvgError> {
        if data.is_empty() {
            return Err(SvgError::MalformedDocument(
                "Failed to parse SVG data: empty input".into(),
            ));
        }

        let max_bytes = options.settings().max_document_bytes;
        if data.len() > max_bytes {
            return Err(too_large(data.len(), max_bytes));
        }

        let tree = if data.starts_with(&GZIP_MAGIC) {
            let inflated = inflate(data, max_bytes)?;
            usvg::Tree::from_data(&inflated, options.usvg())?
        } else {
            usvg::Tree::from_data(data, options.usvg())?
        };

        let size = tree.size();
        let intrinsic_size = Size::new(size.width() as f64, size.height() as f64);
        if !intrinsic_size.is_positive() {
            return Err(SvgError::InvalidSize("Invalid size".into()));
        }

        debug!(
            "svg: parsed {} bytes into a {}x{} document",
            data.len(),
            intrinsic_size.width,
            intrinsic_size.height
        );

        Ok(Self {
            tree,
            intrinsic_size,
        })
    }

    /// Natural size of the document at scale 1.0
    pub fn intrinsic_size(&self) -> Size<f64> {
        self.intrinsic_size
    }

    pub(crate) fn tree(&self) -> &usvg::Tree {
        &self.tree
    }
}

fn too_large(len: usize, max_bytes: usize) -> SvgError {
    SvgError::ElementLimitExceeded(format!(
        "SVG document of {len} bytes exceeds the limit of {max_bytes} bytes"
    ))
}

/// Inflates gzip input, reading at most one byte past the limit so an oversized payload is
/// detected without decompressing all of it.
fn inflate(data: &[u8], max_bytes: usize) -> Result<Vec<u8>, SvgError> {
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut inflated = Vec::new();
    flate2::read::GzDecoder::new(data)
        .take(limit)
        .read_to_end(&mut inflated)
        .map_err(|_| {
            SvgError::CompressionError("Compressed SVG must use the GZip algorithm".into())
        })?;

    if inflated.is_empty() {
        return Err(SvgError::CompressionError(
            "Compressed SVG must use the GZip algorithm".into(),
        ));
    }
    if inflated.len() > max_bytes {
        return Err(too_large(inflated.len(), max_bytes));
    }

    trace!("svg: inflated {} compressed bytes to {}", data.len(), inflated.len());
    Ok(inflated)
}

impl Drop for SvgDocument {
    fn drop(&mut self) {
        trace!("svg: releasing document");
    }
}
