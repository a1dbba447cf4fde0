//! Ownership of parsed documents behind opaque handles.
//!
//! Handles are generation-checked slot map keys, so a handle that was disposed (or never handed
//! out) can not alias a newer document. Documents are stored behind an `Arc`: every operation
//! clones the `Arc` under a short read lock and works on its own reference, which means a dispose
//! that races with a render only frees the document after the render is done.

use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rasterkit_shared::types::Size;
use slotmap::{new_key_type, SlotMap};

use crate::document::SvgDocument;
use crate::errors::SvgError;
use crate::geometry::negotiate_dimensions;
use crate::options::{self, SvgOptions};
use crate::rasterizer::{PixelBuffer, Rasterizer};

new_key_type! {
    /// Opaque reference to a parsed document. `DocumentHandle::default()` never refers to a
    /// document.
    pub struct DocumentHandle;
}

static GLOBAL_REGISTRY: Lazy<Arc<DocumentRegistry>> =
    Lazy::new(|| Arc::new(DocumentRegistry::new(options::global())));

pub struct DocumentRegistry {
    options: Arc<SvgOptions>,
    rasterizer: Rasterizer,
    documents: RwLock<SlotMap<DocumentHandle, Arc<SvgDocument>>>,
}

impl DocumentRegistry {
    pub fn new(options: Arc<SvgOptions>) -> Self {
        Self {
            rasterizer: Rasterizer::new(options.clone()),
            options,
            documents: RwLock::new(SlotMap::with_key()),
        }
    }

    /// Process-wide registry using the global options
    pub fn global() -> Arc<DocumentRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn options(&self) -> &Arc<SvgOptions> {
        &self.options
    }

    /// Parses `data` and registers the document. Nothing is registered when parsing fails.
    pub fn parse(&self, data: &[u8]) -> Result<DocumentHandle, SvgError> {
        let document = SvgDocument::parse(data, &self.options)?;
        let handle = self.documents.write().insert(Arc::new(document));

        debug!("registry: registered document {handle:?}");
        Ok(handle)
    }

    pub fn intrinsic_size(&self, handle: DocumentHandle) -> Result<Size<f64>, SvgError> {
        Ok(self.document(handle)?.intrinsic_size())
    }

    /// Negotiates the output size of a document, see [`negotiate_dimensions`]
    pub fn negotiate_dimensions(
        &self,
        handle: DocumentHandle,
        requested: Size<f64>,
        preserve_aspect_ratio: bool,
    ) -> Result<Size<u32>, SvgError> {
        let source = self.intrinsic_size(handle)?;
        Ok(negotiate_dimensions(source, requested, preserve_aspect_ratio))
    }

    pub fn render(
        &self,
        handle: DocumentHandle,
        width: u32,
        height: u32,
        scale_x: f64,
        scale_y: f64,
    ) -> Result<PixelBuffer, SvgError> {
        let document = self.document(handle)?;
        self.rasterizer
            .render(&document, width, height, scale_x, scale_y)
    }

    /// Releases the document behind `handle`. Disposing a handle twice is reported as
    /// `InvalidHandle` and has no other effect.
    pub fn dispose(&self, handle: DocumentHandle) -> Result<(), SvgError> {
        match self.documents.write().remove(handle) {
            Some(_) => {
                debug!("registry: disposed document {handle:?}");
                Ok(())
            }
            None => Err(invalid_handle(handle)),
        }
    }

    pub fn contains(&self, handle: DocumentHandle) -> bool {
        self.documents.read().contains_key(handle)
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn document(&self, handle: DocumentHandle) -> Result<Arc<SvgDocument>, SvgError> {
        self.documents
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| invalid_handle(handle))
    }
}

fn invalid_handle(handle: DocumentHandle) -> SvgError {
    warn!("registry: operation on unknown or disposed document {handle:?}");
    SvgError::InvalidHandle(format!("{handle:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::options::RenderSettings;
    use slotmap::Key;
    use std::thread;

    const SIMPLE: &str =
        r#"<svg width="30" height="20" xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10" fill="red"/></svg>"#;

    fn registry() -> DocumentRegistry {
        DocumentRegistry::new(Arc::new(SvgOptions::new(RenderSettings {
            load_system_fonts: false,
            ..Default::default()
        })))
    }

    #[test]
    fn lifecycle() {
        let registry = registry();
        let handle = registry.parse(SIMPLE.as_bytes()).unwrap();

        assert!(registry.contains(handle));
        assert_eq!(registry.intrinsic_size(handle).unwrap(), Size::new(30.0, 20.0));
        assert_eq!(
            registry
                .negotiate_dimensions(handle, Size::new(15.0, 15.0), true)
                .unwrap(),
            Size::new(15, 10)
        );
        assert!(registry.render(handle, 30, 20, 1.0, 1.0).is_ok());

        registry.dispose(handle).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn disposed_handle_is_rejected() {
        let registry = registry();
        let handle = registry.parse(SIMPLE.as_bytes()).unwrap();
        registry.dispose(handle).unwrap();

        let kind = |res: Result<(), SvgError>| res.unwrap_err().kind();
        assert_eq!(
            kind(registry.intrinsic_size(handle).map(|_| ())),
            ErrorKind::InvalidHandle
        );
        assert_eq!(
            kind(registry.negotiate_dimensions(handle, Size::<f64>::ZERO, true).map(|_| ())),
            ErrorKind::InvalidHandle
        );
        assert_eq!(
            kind(registry.render(handle, 30, 20, 1.0, 1.0).map(|_| ())),
            ErrorKind::InvalidHandle
        );
        assert_eq!(kind(registry.dispose(handle)), ErrorKind::InvalidHandle);
    }

    #[test]
    fn stale_handle_does_not_alias_new_document() {
        let registry = registry();
        let old = registry.parse(SIMPLE.as_bytes()).unwrap();
        registry.dispose(old).unwrap();

        let new = registry
            .parse(br#"<svg width="8" height="8" xmlns="http://www.w3.org/2000/svg"/>"#)
            .unwrap();

        assert_ne!(old, new);
        assert!(registry.intrinsic_size(old).is_err());
        assert_eq!(registry.intrinsic_size(new).unwrap(), Size::new(8.0, 8.0));
    }

    #[test]
    fn never_parsed_handle_is_rejected() {
        let registry = registry();
        let handle = DocumentHandle::default();

        assert!(handle.is_null());
        assert_eq!(
            registry.intrinsic_size(handle).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
        assert_eq!(registry.dispose(handle).unwrap_err().kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn failed_parse_registers_nothing() {
        let registry = registry();

        assert!(registry.parse(b"").is_err());
        assert!(registry.parse(b"<svg").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_render_keeps_document() {
        let registry = registry();
        let handle = registry.parse(SIMPLE.as_bytes()).unwrap();

        assert!(registry.render(handle, 0, 20, 1.0, 1.0).is_err());
        assert!(registry.contains(handle));
        assert!(registry.render(handle, 30, 20, 1.0, 1.0).is_ok());
    }

    #[test]
    fn dispose_waits_for_in_flight_render() {
        let registry = registry();
        let handle = registry.parse(SIMPLE.as_bytes()).unwrap();

        let document = registry.document(handle).unwrap();
        registry.dispose(handle).unwrap();

        // the reference taken before dispose is still usable
        assert_eq!(document.intrinsic_size(), Size::new(30.0, 20.0));
        assert_eq!(Arc::strong_count(&document), 1);
    }

    #[test]
    fn concurrent_distinct_handles() {
        let registry = Arc::new(registry());

        let workers: Vec<_> = (1..=8u32)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let svg = format!(
                        r#"<svg width="{0}" height="{0}" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="lime"/></svg>"#,
                        i * 4
                    );
                    let handle = registry.parse(svg.as_bytes()).unwrap();
                    let size = registry
                        .negotiate_dimensions(handle, Size::<f64>::ZERO, true)
                        .unwrap();
                    let buffer = registry
                        .render(handle, size.width, size.height, 1.0, 1.0)
                        .unwrap();
                    registry.dispose(handle).unwrap();
                    (i, buffer)
                })
            })
            .collect();

        for worker in workers {
            let (i, buffer) = worker.join().unwrap();
            assert_eq!(buffer.width(), i * 4);
            assert_eq!(buffer.pixel(0, 0), Some([0, 255, 0, 255]));
        }
        assert!(registry.is_empty());
    }
}
