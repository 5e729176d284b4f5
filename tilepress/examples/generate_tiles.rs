//! This example generates a folder of XYZ tiles with a Leaflet preview page.
//!
//! The map is drawn by a toy renderer that paints a graticule, so no map data is needed. Run it
//! with an optional path to a JSON file with [`DirectoryParameters`]:
//!
//! ```shell
//! cargo run --example generate_tiles -- ./params.json
//! ```
//!
//! Without arguments the tiles for zoom levels 0 to 5 of Europe are written into `./tiles`.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use tilepress::tilepress_types::cartesian::Point2d;
use tilepress::tilepress_types::geo::{GeoPoint, Projection, WebMercator};
use tilepress::{
    generate_directory, CancellationToken, DirectoryParameters, LogFeedback, MapRenderer,
    RenderConfig, RenderError,
};

const DEFAULT_PARAMS: &str = r##"{
    "extent": { "x_min": -25.0, "y_min": 34.0, "x_max": 45.0, "y_max": 72.0 },
    "zoom_min": 0,
    "zoom_max": 5,
    "threads": 4,
    "background_color": "#DDEEFFFF",
    "output_directory": "tiles",
    "output_html": "tiles/index.html",
    "html_title": "Graticule"
}"##;

/// Paints lines every 10 degrees of latitude and longitude on a Web Mercator map.
#[derive(Default)]
struct GraticuleRenderer {
    rendered: AtomicUsize,
}

impl MapRenderer for GraticuleRenderer {
    fn render(&self, config: &RenderConfig) -> Result<RgbaImage, RenderError> {
        if !config.destination_crs().is_projected() {
            return Err(RenderError::Failed("only Web Mercator maps are supported".into()));
        }

        let size = config.output_size();
        let extent = config.extent();
        let projection = WebMercator::default();
        let x_step = extent.width() / size.width() as f64;
        let y_step = extent.height() / size.height() as f64;
        let background: Rgba<u8> = config.background().into();

        let mut image = RgbaImage::from_pixel(size.width(), size.height(), background);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let corner = Point2d::new(
                extent.x_min() + x as f64 * x_step,
                extent.y_max() - y as f64 * y_step,
            );
            let opposite = Point2d::new(corner.x + x_step, corner.y - y_step);

            let (Some(a), Some(b)) = (projection.unproject(&corner), projection.unproject(&opposite))
            else {
                return Err(RenderError::Failed(format!("cannot unproject {corner:?}")));
            };

            let crosses = |from: f64, to: f64| (from / 10.0).floor() != (to / 10.0).floor();
            if crosses(a.lon(), b.lon()) || crosses(a.lat(), b.lat()) {
                *pixel = Rgba([60, 60, 60, 255]);
            }
        }

        self.rendered.fetch_add(1, Ordering::Relaxed);
        Ok(image)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let json = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEFAULT_PARAMS.to_string(),
    };
    let params: DirectoryParameters = serde_json::from_str(&json)?;

    let renderer = GraticuleRenderer::default();
    let output = generate_directory(&params, &renderer, &LogFeedback, &CancellationToken::new())
        .map_err(|err| anyhow!("tile generation failed: {err}"))?;

    log::info!(
        "{} tiles of {} metatiles ({} renders) written into {:?}",
        output.report.tiles_written,
        output.report.metatiles_rendered,
        renderer.rendered.load(Ordering::Relaxed),
        output.output_directory
    );
    if let Some(html) = output.output_html {
        log::info!("Open {html:?} in a browser to see the tiles");
    }

    Ok(())
}
