//! Interface to the cartographic renderer that draws map images for metatiles.
//!
//! The renderer itself is not part of this crate. A [`MapRenderer`] receives a [`RenderConfig`]
//! describing what to draw (layers, style settings, projected extent and pixel size) and returns
//! an RGBA raster of exactly the requested size.

use image::RgbaImage;
use thiserror::Error;

mod color;
mod config;

pub use color::Color;
pub use config::{
    ExpressionContext, ExpressionScope, LabelingSettings, RenderConfig, RenderSettings, Variable,
    MAP_SCOPE,
};

/// Error returned by a [`MapRenderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer could not draw the map.
    #[error("{0}")]
    Failed(String),
    /// The rendered image does not have the size requested in the render configuration.
    #[error("rendered image is {actual:?} pixels, expected {expected:?}")]
    UnexpectedSize {
        /// Requested `(width, height)`.
        expected: (u32, u32),
        /// Returned `(width, height)`.
        actual: (u32, u32),
    },
}

/// Capability to draw a map into an image.
///
/// One renderer is shared by all render workers, so `render` is called concurrently with
/// different configurations.
pub trait MapRenderer: Send + Sync {
    /// Renders the map area `config.extent()` into an image of `config.output_size()` pixels.
    fn render(&self, config: &RenderConfig) -> Result<RgbaImage, RenderError>;
}

impl<T: MapRenderer + ?Sized> MapRenderer for &T {
    fn render(&self, config: &RenderConfig) -> Result<RgbaImage, RenderError> {
        (**self).render(config)
    }
}

impl<T: MapRenderer + ?Sized> MapRenderer for std::sync::Arc<T> {
    fn render(&self, config: &RenderConfig) -> Result<RgbaImage, RenderError> {
        (**self).render(config)
    }
}
