//! Error types used by the crate.

use image::ImageError;
use thiserror::Error;
use tilepress_types::error::TypesError;

use crate::render::RenderError;

/// Tilepress error type.
#[derive(Debug, Error)]
pub enum TilepressError {
    /// Parameters of the run are invalid. Reported before any rendering starts.
    #[error("{0}")]
    InvalidParameters(String),
    /// The renderer failed to produce an image for a metatile.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    /// Error reading/writing data to the FS.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Image encoding error.
    #[error("image encode error: {0}")]
    Image(#[from] ImageError),
    /// Error writing into an MBTiles package.
    #[error("mbtiles database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Storage writer was used in a wrong way.
    #[error("tile writer error: {0}")]
    Writer(String),
    /// Tile cannot be added to a metatile.
    #[error("invalid metatile: {0}")]
    MetaTile(String),
    /// Geometry error.
    #[error("geometry error: {0}")]
    Geometry(#[from] TypesError),
    /// Worker pool could not be created.
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}
