use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use rasterkit_config::storage::JsonStorageAdapter;
use rasterkit_config::{config_store, config_store_write};
use rasterkit_shared::types::Size;
use rasterkit_svg::geometry::negotiate_dimensions;
use rasterkit_svg::options::{self, RenderSettings};
use rasterkit_svg::rasterizer::demultiply;
use rasterkit_svg::{DocumentRegistry, ImageLoader, SvgImageLoader};
use simple_logger::SimpleLogger;

#[derive(Debug, Parser)]
#[clap(name = "svg-render", version = "0.1.0", author = "Rasterkit")]
#[clap(about = "Rasterizes an SVG file into a PNG image")]
struct Cli {
    /// The svg (or svgz) file to render
    input: PathBuf,

    /// Output png file, defaults to the input file with a png extension
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Requested width in logical pixels, 0 derives it from the document
    #[clap(short = 'W', long = "width", default_value_t = 0.0)]
    width: f64,

    /// Requested height in logical pixels, 0 derives it from the document
    #[clap(short = 'H', long = "height", default_value_t = 0.0)]
    height: f64,

    /// Stretch to the requested size instead of fitting inside it
    #[clap(long = "stretch")]
    stretch: bool,

    /// Device pixel ratio
    #[clap(short = 's', long = "scale", default_value_t = 1.0)]
    scale: f32,

    /// Json file with settings that override the defaults
    #[clap(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Only print the document size and the negotiated output size
    #[clap(long = "info")]
    info: bool,

    /// Enable debug logging
    #[clap(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if args.debug {
        SimpleLogger::new().init()?;
    }

    if let Some(path) = &args.config {
        let storage = JsonStorageAdapter::try_from(path.as_path())
            .with_context(|| format!("cannot read settings from {}", path.display()))?;
        config_store_write().set_storage(Box::new(storage));
    }

    options::init_global(RenderSettings::from_config(&config_store()));
    let registry = DocumentRegistry::global();

    let mut input = File::open(&args.input)
        .with_context(|| format!("cannot open {}", args.input.display()))?;
    let mut loader = SvgImageLoader::new(Arc::clone(&registry), &mut input)
        .with_context(|| format!("cannot load {}", args.input.display()))?;

    let preserve_aspect_ratio = !args.stretch;

    if args.info {
        let handle = loader.handle().ok_or_else(|| anyhow!("document was not loaded"))?;
        let intrinsic = registry.intrinsic_size(handle)?;
        let output = negotiate_dimensions(
            intrinsic.scale(args.scale as f64),
            Size::new(args.width, args.height).scale(args.scale as f64),
            preserve_aspect_ratio,
        );

        println!("Intrinsic size : {} x {}", intrinsic.width, intrinsic.height);
        println!("Output size    : {} x {}", output.width, output.height);
        return Ok(());
    }

    let frame = loader
        .load(0, args.width, args.height, preserve_aspect_ratio, true, args.scale)?
        .ok_or_else(|| anyhow!("document has no frame"))?;

    // png stores straight alpha
    let mut pixels = frame.pixels;
    demultiply(&mut pixels);

    let image = image::RgbaImage::from_raw(frame.width, frame.height, pixels)
        .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", frame.width, frame.height))?;

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("png"));
    image
        .save(&output)
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!("Wrote {} ({} x {})", output.display(), frame.width, frame.height);
    Ok(())
}
