//! Tilepress renders a map into a pyramid of raster tiles addressed by the slippy map (XYZ)
//! scheme and stores them as an [MBTiles](https://github.com/mapbox/mbtiles-spec) package or as
//! a `{z}/{x}/{y}.png` folder tree.
//!
//! # Quick start
//!
//! ```no_run
//! use tilepress::{generate_directory, CancellationToken, DirectoryParameters, LogFeedback};
//! # fn renderer() -> impl tilepress::MapRenderer { unimplemented!() }
//!
//! let params: DirectoryParameters = serde_json::from_str(r#"{
//!     "extent": { "x_min": -10.0, "y_min": 40.0, "x_max": 10.0, "y_max": 50.0 },
//!     "zoom_min": 0,
//!     "zoom_max": 6,
//!     "threads": 4,
//!     "output_directory": "tiles",
//!     "output_html": "tiles/index.html"
//! }"#).unwrap();
//!
//! let output = generate_directory(&params, renderer(), &LogFeedback, &CancellationToken::new()).unwrap();
//! println!("{} tiles written", output.report.tiles_written);
//! ```
//!
//! # How it works
//!
//! Drawing a map is the job of a [`MapRenderer`], which is provided by the user of the crate.
//! Rendering every tile separately would be slow and would cut labels at tile borders, so the
//! tiles of each zoom level are grouped into [metatiles](metatile), square blocks of up to
//! `metatile_size × metatile_size` tiles. The [`RenderDispatcher`] renders the metatiles on a
//! pool of worker threads, every worker with its own [`RenderConfig`], cuts the resulting images
//! into tiles and passes them to a [`TileWriter`]:
//!
//! * [`MbtilesWriter`] stores them in an SQLite database,
//! * [`DirectoryWriter`] stores them as separate files, optionally with a [`LeafletPreview`] page.
//!
//! Progress is reported through the [`Feedback`] trait, and a run can be stopped at any time
//! with a [`CancellationToken`].

pub mod algorithm;
pub mod dispatcher;
pub mod error;
pub mod metatile;
pub mod progress;
pub mod raster;
pub mod render;
pub mod tile;
pub mod writer;

#[cfg(test)]
pub(crate) mod tests;

pub use algorithm::{
    generate_directory, generate_mbtiles, DirectoryOutput, DirectoryParameters, MbtilesOutput,
    MbtilesParameters, TileGenerationParameters,
};
pub use dispatcher::{DispatchState, RenderDispatcher, RenderPlan, RunReport};
pub use error::TilepressError;
pub use metatile::{count_metatiles, MetaTile, Metatiles, TileGrid};
pub use progress::{CancellationToken, Feedback, LogFeedback, NoFeedback};
pub use raster::TileFormat;
pub use render::{Color, MapRenderer, RenderConfig, RenderError, RenderSettings};
pub use tile::Tile;
pub use tilepress_types;
pub use writer::{DirectoryWriter, LeafletPreview, MbtilesWriter, TileParams, TileWriter};
