//! Storage backends for generated tiles.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tilepress_types::geo::GeoExtent;

use crate::error::TilepressError;
use crate::raster::TileFormat;
use crate::tile::Tile;

mod directory;
mod mbtiles;
mod preview;

pub use directory::DirectoryWriter;
pub use mbtiles::MbtilesWriter;
pub use preview::LeafletPreview;

/// Parameters of a run, given to a [`TileWriter`] before any tile is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileParams {
    /// Image format of the stored tiles.
    pub format: TileFormat,
    /// JPEG quality, `1..=100`.
    pub quality: u8,
    /// Width of a tile in pixels.
    pub tile_width: u32,
    /// Height of a tile in pixels.
    pub tile_height: u32,
    /// Lowest generated zoom level.
    pub min_zoom: u8,
    /// Highest generated zoom level.
    pub max_zoom: u8,
    /// Area of the run in WGS84 coordinates.
    pub extent: GeoExtent,
}

/// Destination of generated tiles.
///
/// The dispatcher calls [`configure`](TileWriter::configure) once, then
/// [`write_tile`](TileWriter::write_tile) for every tile, possibly from many threads at once,
/// and finally [`close`](TileWriter::close) exactly once, also when the run fails or is canceled.
pub trait TileWriter: Send + Sync {
    /// Prepares the storage for a run with the given parameters.
    fn configure(&mut self, params: &TileParams) -> Result<(), TilepressError>;

    /// Stores a single tile image.
    fn write_tile(&self, tile: &Tile, image: &RgbaImage) -> Result<(), TilepressError>;

    /// Finalizes the storage.
    fn close(&mut self) -> Result<(), TilepressError>;
}

fn not_configured() -> TilepressError {
    TilepressError::Writer("writer is used before it was configured".into())
}
