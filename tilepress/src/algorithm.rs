//! Entry points generating a tile pyramid into an MBTiles package or a folder tree.
//!
//! Parameters are plain serde structures, so they can be filled by a UI, a command line parser
//! or loaded from a JSON file. They are validated before anything is rendered or written.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};
use tilepress_types::cartesian::Rect;
use tilepress_types::geo::{Crs, GeoExtent};

use crate::dispatcher::{check_pyramid, RenderDispatcher, RenderPlan, RunReport};
pub use crate::dispatcher::{MAX_ZOOM, METATILE_SIZE_RANGE, TILE_SIZE_RANGE};
use crate::error::TilepressError;
use crate::progress::{CancellationToken, Feedback};
use crate::raster::TileFormat;
use crate::render::{Color, LabelingSettings, MapRenderer, RenderSettings};
use crate::writer::{DirectoryWriter, LeafletPreview, MbtilesWriter, TileWriter};

/// Allowed output resolutions.
pub const DPI_RANGE: RangeInclusive<u32> = 48..=600;
/// Allowed JPEG quality values.
pub const QUALITY_RANGE: RangeInclusive<u8> = 1..=100;

/// Parameters shared by all tile generation entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGenerationParameters {
    /// Area to generate tiles for, in `extent_crs` coordinates.
    pub extent: Rect,
    /// CRS of the extent.
    #[serde(default = "default_extent_crs")]
    pub extent_crs: Crs,
    /// Lowest zoom level.
    #[serde(default = "default_zoom")]
    pub zoom_min: u8,
    /// Highest zoom level.
    #[serde(default = "default_zoom")]
    pub zoom_max: u8,
    /// Resolution of the rendered map.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Background of PNG tiles. JPEG tiles always get white background.
    #[serde(default = "default_background_color")]
    pub background_color: Color,
    /// Render with antialiasing.
    #[serde(default = "default_true")]
    pub antialias: bool,
    /// Image format of the tiles.
    #[serde(default)]
    pub tile_format: TileFormat,
    /// JPEG quality.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Metatiles have up to `metatile_size × metatile_size` tiles.
    #[serde(default = "default_metatile_size")]
    pub metatile_size: u32,
    /// Tile width in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_width: u32,
    /// Tile height in pixels.
    #[serde(default = "default_tile_size")]
    pub tile_height: u32,
    /// Number of render threads.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Layers to render, from top to bottom.
    #[serde(default)]
    pub layers: Vec<String>,
}

fn default_extent_crs() -> Crs {
    Crs::WGS84
}

fn default_zoom() -> u8 {
    12
}

fn default_dpi() -> u32 {
    96
}

fn default_background_color() -> Color {
    Color::TRANSPARENT
}

fn default_true() -> bool {
    true
}

fn default_quality() -> u8 {
    75
}

fn default_metatile_size() -> u32 {
    4
}

fn default_tile_size() -> u32 {
    256
}

fn default_threads() -> usize {
    1
}

impl TileGenerationParameters {
    /// Creates parameters for the WGS84 extent with default values of everything else.
    pub fn new(extent: Rect) -> Self {
        Self {
            extent,
            extent_crs: default_extent_crs(),
            zoom_min: default_zoom(),
            zoom_max: default_zoom(),
            dpi: default_dpi(),
            background_color: default_background_color(),
            antialias: true,
            tile_format: TileFormat::default(),
            quality: default_quality(),
            metatile_size: default_metatile_size(),
            tile_width: default_tile_size(),
            tile_height: default_tile_size(),
            threads: default_threads(),
            layers: Vec::new(),
        }
    }

    /// Validates the parameters.
    pub fn check(&self) -> Result<(), TilepressError> {
        check_pyramid(
            self.zoom_min..=self.zoom_max,
            self.metatile_size,
            (self.tile_width, self.tile_height),
            self.threads,
        )?;
        if !DPI_RANGE.contains(&self.dpi) {
            return invalid(&format!("DPI must be in range {DPI_RANGE:?}."));
        }
        if !QUALITY_RANGE.contains(&self.quality) {
            return invalid(&format!("Quality must be in range {QUALITY_RANGE:?}."));
        }

        let extent = &self.extent;
        let finite = [extent.x_min, extent.y_min, extent.x_max, extent.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || extent.x_min >= extent.x_max || extent.y_min >= extent.y_max {
            return invalid("Invalid extent.");
        }

        Ok(())
    }

    /// Extent converted to WGS84 and limited to the area covered by Web Mercator tiles.
    pub fn wgs84_extent(&self) -> Result<GeoExtent, TilepressError> {
        Ok(self
            .extent_crs
            .unproject_rect(&self.extent)?
            .clamp_to_web_mercator())
    }

    /// Render plan of the parameters.
    pub fn render_plan(&self) -> Result<RenderPlan, TilepressError> {
        Ok(RenderPlan {
            extent: self.wgs84_extent()?,
            min_zoom: self.zoom_min,
            max_zoom: self.zoom_max,
            metatile_size: self.metatile_size,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            threads: self.threads,
            format: self.tile_format,
            quality: self.quality,
        })
    }

    /// Render settings of the parameters.
    pub fn render_settings(&self) -> RenderSettings {
        let background = if self.tile_format.supports_transparency() {
            self.background_color
        } else {
            Color::WHITE
        };

        RenderSettings {
            destination_crs: Crs::EPSG3857,
            layers: self.layers.clone(),
            output_dpi: self.dpi as f64,
            background,
            antialiasing: self.antialias,
            labeling: LabelingSettings {
                partial_labels: false,
            },
            ..Default::default()
        }
    }
}

fn invalid(message: &str) -> Result<(), TilepressError> {
    Err(TilepressError::InvalidParameters(message.into()))
}

/// Parameters of [`generate_mbtiles`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtilesParameters {
    /// Common parameters.
    #[serde(flatten)]
    pub common: TileGenerationParameters,
    /// Path of the package.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl MbtilesParameters {
    /// Validates the parameters.
    pub fn check(&self) -> Result<(), TilepressError> {
        self.common.check()?;
        self.output_file()?;
        Ok(())
    }

    fn output_file(&self) -> Result<PathBuf, TilepressError> {
        match &self.output_file {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Err(TilepressError::InvalidParameters(
                "You need to specify output filename.".into(),
            )),
        }
    }
}

/// Result of [`generate_mbtiles`].
#[derive(Debug, Clone, PartialEq)]
pub struct MbtilesOutput {
    /// Path of the package.
    pub output_file: PathBuf,
    /// Summary of the run.
    pub report: RunReport,
}

/// Parameters of [`generate_directory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryParameters {
    /// Common parameters.
    #[serde(flatten)]
    pub common: TileGenerationParameters,
    /// Number tile rows from the bottom.
    #[serde(default)]
    pub tms_convention: bool,
    /// Root of the folder tree.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    /// Path of the Leaflet preview page. No page is generated if not set.
    #[serde(default)]
    pub output_html: Option<PathBuf>,
    /// Title of the preview page.
    #[serde(default)]
    pub html_title: Option<String>,
    /// Attribution of the tiles on the preview page.
    #[serde(default)]
    pub html_attribution: Option<String>,
    /// Show OpenStreetMap under the tiles on the preview page.
    #[serde(default)]
    pub html_osm: bool,
}

impl DirectoryParameters {
    /// Validates the parameters.
    pub fn check(&self) -> Result<(), TilepressError> {
        self.common.check()?;
        self.output_directory()?;
        Ok(())
    }

    fn output_directory(&self) -> Result<PathBuf, TilepressError> {
        match &self.output_directory {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Err(TilepressError::InvalidParameters(
                "You need to specify output directory.".into(),
            )),
        }
    }
}

/// Result of [`generate_directory`].
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryOutput {
    /// Root of the folder tree.
    pub output_directory: PathBuf,
    /// Path of the preview page, if one was written.
    pub output_html: Option<PathBuf>,
    /// Summary of the run.
    pub report: RunReport,
}

/// Renders the tiles into an MBTiles package.
pub fn generate_mbtiles(
    params: &MbtilesParameters,
    renderer: impl MapRenderer,
    feedback: &dyn Feedback,
    cancel: &CancellationToken,
) -> Result<MbtilesOutput, TilepressError> {
    params.check()?;
    let output_file = params.output_file()?;

    let mut writer = MbtilesWriter::new(&output_file)?;
    let report = generate(&params.common, renderer, &mut writer, feedback, cancel)?;

    Ok(MbtilesOutput {
        output_file,
        report,
    })
}

/// Renders the tiles into a `{z}/{x}/{y}` folder tree and optionally writes a preview page.
///
/// The preview page is not written if the run is canceled.
pub fn generate_directory(
    params: &DirectoryParameters,
    renderer: impl MapRenderer,
    feedback: &dyn Feedback,
    cancel: &CancellationToken,
) -> Result<DirectoryOutput, TilepressError> {
    params.check()?;
    let output_directory = params.output_directory()?;

    let mut writer = DirectoryWriter::new(&output_directory, params.tms_convention);
    let report = generate(&params.common, renderer, &mut writer, feedback, cancel)?;

    let mut output_html = None;
    if let Some(html_path) = &params.output_html {
        if !report.canceled {
            let plan = params.common.render_plan()?;
            LeafletPreview::new(&output_directory, &plan.tile_params(), params.tms_convention)
                .with_title(params.html_title.clone())
                .with_attribution(params.html_attribution.clone())
                .with_osm(params.html_osm)
                .write(html_path)?;
            output_html = Some(html_path.clone());
        }
    }

    Ok(DirectoryOutput {
        output_directory,
        output_html,
        report,
    })
}

fn generate(
    params: &TileGenerationParameters,
    renderer: impl MapRenderer,
    writer: &mut dyn TileWriter,
    feedback: &dyn Feedback,
    cancel: &CancellationToken,
) -> Result<RunReport, TilepressError> {
    let plan = params.render_plan()?;
    info!(
        "Generating {} tiles for {} at zoom levels {}..={}",
        plan.format.extension(),
        plan.extent,
        plan.min_zoom,
        plan.max_zoom
    );

    let dispatcher = RenderDispatcher::new(renderer, plan, params.render_settings())?;
    dispatcher.run(writer, feedback, cancel)
}
