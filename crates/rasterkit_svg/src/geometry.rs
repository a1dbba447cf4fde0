//! Output size negotiation.
//!
//! Everything in here is pure: the result only depends on the arguments.

use rasterkit_shared::types::Size;

/// Computes the pixel size of the output image.
///
/// A requested axis of zero (or anything that is not a positive finite number) means "derive
/// this axis". With both axes missing the source size is used as is. With one axis missing it is
/// derived from the source aspect ratio, whatever `preserve_aspect_ratio` says. With both axes
/// given the source is either fitted inside the requested box or stretched to it.
///
/// The source size must be positive, which every parsed document guarantees. Results are rounded
/// to the nearest integer and never smaller than 1.
pub fn negotiate_dimensions(
    source: Size<f64>,
    requested: Size<f64>,
    preserve_aspect_ratio: bool,
) -> Size<u32> {
    debug_assert!(source.is_positive(), "source size must be positive");

    let req_width = requested_axis(requested.width);
    let req_height = requested_axis(requested.height);

    let (width, height) = match (req_width, req_height) {
        (None, None) => (source.width, source.height),
        (Some(width), None) => (width, source.height * width / source.width),
        (None, Some(height)) => (source.width * height / source.height, height),
        (Some(width), Some(height)) if preserve_aspect_ratio => {
            let scale = (width / source.width).min(height / source.height);
            (source.width * scale, source.height * scale)
        }
        (Some(width), Some(height)) => (width, height),
    };

    Size::new(to_pixels(width), to_pixels(height))
}

/// Per-axis scale that maps the document's intrinsic size onto the output size
pub fn scale_factors(intrinsic: Size<f64>, output: Size<u32>) -> (f64, f64) {
    (
        output.width as f64 / intrinsic.width,
        output.height as f64 / intrinsic.height,
    )
}

fn requested_axis(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn to_pixels(value: f64) -> u32 {
    if !value.is_finite() {
        return 1;
    }
    value.round().clamp(1.0, u32::MAX as f64) as u32
}
