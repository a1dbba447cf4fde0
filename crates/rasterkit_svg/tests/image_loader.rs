use std::io;
use std::sync::Arc;

use rasterkit_shared::types::Size;
use rasterkit_svg::loader::ImageType;
use rasterkit_svg::options::{RenderSettings, SvgOptions};
use rasterkit_svg::{DocumentHandle, DocumentRegistry, ErrorKind, ImageLoader, SvgError, SvgImageLoader};

const BANDS: &str = r#"<svg version="1.1" width="30" height="20" xmlns="http://www.w3.org/2000/svg">
   <rect width="30%" height="100%" fill="red" />
   <rect x="30%" width="30%" height="100%" fill="lime" />
   <rect x="60%" width="30%" height="100%" fill="blue" />
</svg>"#;

fn registry() -> Arc<DocumentRegistry> {
    let options = SvgOptions::new(RenderSettings {
        load_system_fonts: false,
        ..Default::default()
    });
    Arc::new(DocumentRegistry::new(Arc::new(options)))
}

fn svg_error(err: &io::Error) -> Option<&SvgError> {
    err.get_ref().and_then(|e| e.downcast_ref::<SvgError>())
}

#[test]
fn simple_svg() {
    let registry = registry();
    let mut loader = SvgImageLoader::new(registry.clone(), &mut BANDS.as_bytes()).unwrap();

    let frame = loader.load(0, 0.0, 0.0, true, false, 1.0).unwrap().unwrap();

    assert_eq!(frame.width, 30);
    assert_eq!(frame.height, 20);
    assert_eq!(frame.stride, 4 * 30);
    assert_eq!(frame.image_type, ImageType::RgbaPremultiplied);
    assert_eq!(frame.pixels.len(), 30 * 20 * 4);

    let data = &frame.pixels;
    assert_eq!(&data[5 * 4..5 * 4 + 4], &[255, 0, 0, 255]);
    assert_eq!(&data[15 * 4..15 * 4 + 4], &[0, 255, 0, 255]);
    assert_eq!(&data[25 * 4..25 * 4 + 4], &[0, 0, 255, 255]);

    // same pixels on the last row
    let last_row = 19 * frame.stride;
    assert_eq!(&data[last_row + 15 * 4..last_row + 15 * 4 + 4], &[0, 255, 0, 255]);
}

#[test]
fn width_only_request_keeps_aspect_ratio() {
    let registry = registry();
    let mut loader = SvgImageLoader::new(registry, &mut BANDS.as_bytes()).unwrap();

    let frame = loader.load(0, 60.0, 0.0, true, false, 1.0).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (60, 40));

    let px = |x: usize, y: usize| &frame.pixels[y * frame.stride + x * 4..y * frame.stride + x * 4 + 4];
    assert_eq!(px(10, 20), &[255, 0, 0, 255]);
    assert_eq!(px(30, 20), &[0, 255, 0, 255]);
    assert_eq!(px(50, 20), &[0, 0, 255, 255]);
}

#[test]
fn parse_errors_surface_as_io_errors() {
    let registry = registry();

    let cases: [(&[u8], ErrorKind); 4] = [
        (b"", ErrorKind::MalformedDocument),
        (b"<svg xmlns='http://www.w3.org/2000/svg'", ErrorKind::MalformedDocument),
        (b"<svg width='-5' height='5' xmlns='http://www.w3.org/2000/svg'/>", ErrorKind::InvalidSize),
        (b"\x1f\x8bgarbage", ErrorKind::CompressionError),
    ];

    for (data, kind) in cases {
        let err = SvgImageLoader::new(registry.clone(), &mut &data[..]).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(svg_error(&err).map(SvgError::kind), Some(kind));
    }

    assert!(registry.is_empty());
}

#[test]
fn handle_lifecycle() {
    let registry = registry();
    let handle = registry.parse(BANDS.as_bytes()).unwrap();

    let size = registry.intrinsic_size(handle).unwrap();
    assert_eq!(size, Size::new(30.0, 20.0));
    assert_eq!(registry.intrinsic_size(handle).unwrap(), size);

    let out = registry
        .negotiate_dimensions(handle, Size::new(15.0, 15.0), true)
        .unwrap();
    assert_eq!(out, Size::new(15, 10));

    let first = registry.render(handle, 30, 20, 1.0, 1.0).unwrap();
    let second = registry.render(handle, 30, 20, 1.0, 1.0).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());

    let err = registry.render(handle, 0, 20, 1.0, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSize);

    registry.dispose(handle).unwrap();
    assert_eq!(
        registry.render(handle, 30, 20, 1.0, 1.0).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
    assert_eq!(
        registry.intrinsic_size(handle).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
    assert_eq!(registry.dispose(handle).unwrap_err().kind(), ErrorKind::InvalidHandle);
    assert_eq!(
        registry.dispose(DocumentHandle::default()).unwrap_err().kind(),
        ErrorKind::InvalidHandle
    );
}
