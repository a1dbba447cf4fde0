//! Process-wide parsing and rendering options.
//!
//! Building the options loads the font database, which is expensive, so it is done once and the
//! result is shared as an `Arc<SvgOptions>`. The registry and rasterizer receive the options they
//! use explicitly; [`global()`] only exists for callers that want a process-wide default.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::OnceCell;
use rasterkit_config::settings::Setting;
use rasterkit_config::ConfigStore;
use rasterkit_shared::types::Size;
use resvg::usvg::{self, ImageRendering, ShapeRendering, TextRendering};

static GLOBAL_OPTIONS: OnceCell<Arc<SvgOptions>> = OnceCell::new();

/// Plain option values, before any font loading has happened
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub load_system_fonts: bool,
    pub font_family: String,
    pub font_size: f32,
    pub dpi: f32,
    pub shape_rendering: ShapeRendering,
    pub text_rendering: TextRendering,
    pub image_rendering: ImageRendering,
    /// Viewport used when a document declares neither a size nor a viewBox
    pub default_size: Size<f32>,
    /// Inputs above this size are rejected before parsing
    pub max_document_bytes: usize,
    /// Largest output width or height the rasterizer will allocate
    pub max_dimension: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            load_system_fonts: true,
            font_family: "Times New Roman".to_string(),
            font_size: 12.0,
            dpi: 96.0,
            shape_rendering: ShapeRendering::GeometricPrecision,
            text_rendering: TextRendering::GeometricPrecision,
            image_rendering: ImageRendering::OptimizeQuality,
            default_size: Size::new(100.0, 100.0),
            max_document_bytes: 64 * 1024 * 1024,
            max_dimension: 16_384,
        }
    }
}

impl RenderSettings {
    /// Reads all settings from the given config store. Missing or malformed values keep their
    /// default.
    pub fn from_config(store: &ConfigStore) -> Self {
        let mut settings = Self::default();

        if let Some(Setting::Bool(value)) = store.get("fonts.load_system_fonts") {
            settings.load_system_fonts = value;
        }
        if let Some(Setting::String(value)) = store.get("fonts.default_family") {
            settings.font_family = value;
        }
        if let Some(value) = positive_uint(store, "fonts.default_size") {
            settings.font_size = value as f32;
        }
        if let Some(value) = positive_uint(store, "render.dpi") {
            settings.dpi = value as f32;
        }
        if let Some(Setting::String(value)) = store.get("render.shape_rendering") {
            match parse_shape_rendering(&value) {
                Some(mode) => settings.shape_rendering = mode,
                None => warn!("options: unknown shape rendering mode {value}"),
            }
        }
        if let Some(Setting::String(value)) = store.get("render.text_rendering") {
            match parse_text_rendering(&value) {
                Some(mode) => settings.text_rendering = mode,
                None => warn!("options: unknown text rendering mode {value}"),
            }
        }
        if let Some(Setting::String(value)) = store.get("render.image_rendering") {
            match parse_image_rendering(&value) {
                Some(mode) => settings.image_rendering = mode,
                None => warn!("options: unknown image rendering mode {value}"),
            }
        }
        if let (Some(width), Some(height)) = (
            positive_uint(store, "document.default_width"),
            positive_uint(store, "document.default_height"),
        ) {
            settings.default_size = Size::new(width as f32, height as f32);
        }
        if let Some(value) = positive_uint(store, "limits.max_document_bytes") {
            settings.max_document_bytes = value;
        }
        if let Some(value) = positive_uint(store, "limits.max_dimension") {
            settings.max_dimension = u32::try_from(value).unwrap_or(u32::MAX);
        }

        settings
    }
}

fn positive_uint(store: &ConfigStore, key: &str) -> Option<usize> {
    match store.get(key) {
        Some(Setting::UInt(0)) => {
            warn!("options: {key} must be positive");
            None
        }
        Some(Setting::UInt(value)) => Some(value),
        _ => None,
    }
}

fn parse_shape_rendering(value: &str) -> Option<ShapeRendering> {
    match value {
        "optimize_speed" => Some(ShapeRendering::OptimizeSpeed),
        "crisp_edges" => Some(ShapeRendering::CrispEdges),
        "geometric_precision" => Some(ShapeRendering::GeometricPrecision),
        _ => None,
    }
}

fn parse_text_rendering(value: &str) -> Option<TextRendering> {
    match value {
        "optimize_speed" => Some(TextRendering::OptimizeSpeed),
        "optimize_legibility" => Some(TextRendering::OptimizeLegibility),
        "geometric_precision" => Some(TextRendering::GeometricPrecision),
        _ => None,
    }
}

fn parse_image_rendering(value: &str) -> Option<ImageRendering> {
    match value {
        "optimize_quality" => Some(ImageRendering::OptimizeQuality),
        "optimize_speed" => Some(ImageRendering::OptimizeSpeed),
        _ => None,
    }
}

/// Immutable, fully initialised parser options. Never mutated after construction.
pub struct SvgOptions {
    settings: RenderSettings,
    usvg: usvg::Options<'static>,
}

impl SvgOptions {
    pub fn new(settings: RenderSettings) -> Self {
        let mut opts = usvg::Options {
            dpi: settings.dpi,
            font_family: settings.font_family.clone(),
            font_size: settings.font_size,
            shape_rendering: settings.shape_rendering,
            text_rendering: settings.text_rendering,
            image_rendering: settings.image_rendering,
            ..Default::default()
        };

        if let Some(size) =
            usvg::Size::from_wh(settings.default_size.width, settings.default_size.height)
        {
            opts.default_size = size;
        }

        if settings.load_system_fonts {
            opts.fontdb_mut().load_system_fonts();
            debug!("options: loaded {} system font faces", opts.fontdb.len());
        }

        Self {
            settings,
            usvg: opts,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub(crate) fn usvg(&self) -> &usvg::Options<'static> {
        &self.usvg
    }
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl Debug for SvgOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgOptions")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Initialises the process-wide options. Only the first call has any effect; it returns `true`
/// when this call did the initialisation.
pub fn init_global(settings: RenderSettings) -> bool {
    let mut initialised = false;
    GLOBAL_OPTIONS.get_or_init(|| {
        initialised = true;
        Arc::new(SvgOptions::new(settings))
    });

    if !initialised {
        debug!("options: global options were already initialised");
    }
    initialised
}

/// Returns the process-wide options, initialising them from the config store on first use
pub fn global() -> Arc<SvgOptions> {
    GLOBAL_OPTIONS
        .get_or_init(|| {
            let settings = RenderSettings::from_config(&rasterkit_config::config_store());
            Arc::new(SvgOptions::new(settings))
        })
        .clone()
}
