//! SVG decoding for image pipelines.
//!
//! The flow is: raw bytes are parsed into a document owned by a [`DocumentRegistry`], which hands
//! out a [`DocumentHandle`]. The caller negotiates the output size against the document's
//! intrinsic size, renders into a premultiplied RGBA [`PixelBuffer`] and finally disposes the
//! handle. [`SvgImageLoader`] wraps the whole flow behind the [`ImageLoader`] interface.

pub mod document;
pub mod errors;
pub mod geometry;
pub mod loader;
pub mod options;
pub mod rasterizer;
pub mod registry;

pub use errors::{ErrorKind, SvgError};
pub use loader::{ImageFrame, ImageLoader, ImageLoaderFactory, SvgImageLoader, SvgImageLoaderFactory};
pub use rasterizer::{PixelBuffer, Rasterizer};
pub use registry::{DocumentHandle, DocumentRegistry};
