//! Slicing of rendered metatile images into tiles and encoding of tile images.

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, ColorType, ImageEncoder, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::TilepressError;
use crate::metatile::MetaTile;
use crate::tile::Tile;

/// Image format of the stored tiles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// PNG with alpha channel.
    #[default]
    Png,
    /// JPEG. The alpha channel is dropped.
    #[serde(alias = "jpeg")]
    Jpg,
}

impl TileFormat {
    /// File extension and MBTiles `format` value.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpg => "jpg",
        }
    }

    /// Returns true if the format keeps the alpha channel.
    pub fn supports_transparency(&self) -> bool {
        matches!(self, TileFormat::Png)
    }
}

/// Cuts the rendered metatile image into tile images.
///
/// A tile at row `r` and column `c` of the metatile is taken from the rectangle of
/// `tile_width × tile_height` pixels with the top-left corner at `(c * tile_width, r * tile_height)`.
/// The image must be at least `columns × tile_width` by `rows × tile_height` pixels.
pub fn slice_metatile(
    image: &RgbaImage,
    metatile: &MetaTile,
    tile_width: u32,
    tile_height: u32,
) -> Result<Vec<(Tile, RgbaImage)>, TilepressError> {
    let required_width = metatile.columns() as u64 * tile_width as u64;
    let required_height = metatile.rows() as u64 * tile_height as u64;
    if (image.width() as u64) < required_width || (image.height() as u64) < required_height {
        return Err(TilepressError::MetaTile(format!(
            "image of {}x{} pixels is too small for {} columns and {} rows of {tile_width}x{tile_height} tiles",
            image.width(),
            image.height(),
            metatile.columns(),
            metatile.rows(),
        )));
    }

    Ok(metatile
        .tiles()
        .iter()
        .map(|entry| {
            let tile_image = imageops::crop_imm(
                image,
                entry.column * tile_width,
                entry.row * tile_height,
                tile_width,
                tile_height,
            )
            .to_image();
            (entry.tile, tile_image)
        })
        .collect())
}

/// Encodes the tile image. `quality` (`1..=100`) is used only by JPEG.
pub fn encode_tile(
    image: &RgbaImage,
    format: TileFormat,
    quality: u8,
) -> Result<Vec<u8>, TilepressError> {
    let mut buf = Vec::new();
    match format {
        TileFormat::Png => {
            PngEncoder::new(&mut buf).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::Rgba8,
            )?;
        }
        TileFormat::Jpg => {
            let rgb: RgbImage = image.convert();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ColorType::Rgb8,
            )?;
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::metatile::{Metatiles, TileGrid};

    fn numbered_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, (x / 256) as u8, 255])
        })
    }

    #[test]
    fn slicing_is_lossless() {
        let grid = TileGrid {
            left: 3,
            top: 5,
            right: 7,
            bottom: 6,
            zoom: 4,
        };
        let (tile_width, tile_height) = (16, 8);

        for size in [1, 2, 3, 4] {
            for metatile in &Metatiles::from_grid(grid, size).unwrap() {
                let width = metatile.columns() * tile_width;
                let height = metatile.rows() * tile_height;
                let image = numbered_image(width, height);

                let tiles = slice_metatile(&image, &metatile, tile_width, tile_height).unwrap();
                assert_eq!(tiles.len(), metatile.len());

                let mut covered = 0;
                for ((tile, tile_image), entry) in tiles.iter().zip(metatile.tiles()) {
                    assert_eq!(*tile, entry.tile);
                    assert_eq!(tile_image.dimensions(), (tile_width, tile_height));
                    for (x, y, pixel) in tile_image.enumerate_pixels() {
                        let source = image.get_pixel(
                            entry.column * tile_width + x,
                            entry.row * tile_height + y,
                        );
                        assert_eq!(pixel, source);
                    }
                    covered += tile_image.len();
                }
                assert_eq!(covered, image.len());
            }
        }
    }

    #[test]
    fn slicing_rejects_small_image() {
        let grid = TileGrid {
            left: 0,
            top: 0,
            right: 1,
            bottom: 1,
            zoom: 1,
        };
        let metatile = Metatiles::from_grid(grid, 2).unwrap().iter().next().unwrap();
        let image = numbered_image(32, 31);
        assert!(slice_metatile(&image, &metatile, 16, 16).is_err());
    }

    #[test]
    fn png_keeps_pixels() {
        let image = numbered_image(20, 10);
        let encoded = encode_tile(&image, TileFormat::Png, 10).unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn jpeg_quality_changes_output() {
        let image = numbered_image(64, 64);
        let low = encode_tile(&image, TileFormat::Jpg, 5).unwrap();
        let high = encode_tile(&image, TileFormat::Jpg, 95).unwrap();
        assert_eq!(&low[..3], &[0xFF, 0xD8, 0xFF]);
        assert!(low.len() < high.len());

        let decoded = image::load_from_memory(&high).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn format_names() {
        assert_eq!(TileFormat::Png.extension(), "png");
        assert_eq!(TileFormat::Jpg.extension(), "jpg");
        assert_eq!(
            serde_json::from_str::<TileFormat>("\"jpeg\"").unwrap(),
            TileFormat::Jpg
        );
        assert_eq!(serde_json::to_string(&TileFormat::Png).unwrap(), "\"png\"");
    }
}
