use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{debug, trace};

use crate::error::TilepressError;
use crate::raster::{encode_tile, TileFormat};
use crate::tile::{to_tms_row, Tile};
use crate::writer::{not_configured, TileParams, TileWriter};

/// Stores tiles as separate image files in a `{z}/{x}/{y}.{ext}` folder tree.
///
/// With the TMS convention the `{y}` part is the bottom-origin row.
#[derive(Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
    tms: bool,
    params: Option<TileParams>,
}

impl DirectoryWriter {
    /// Creates a writer storing tiles under `root`.
    pub fn new(root: impl AsRef<Path>, tms: bool) -> Self {
        Self {
            root: root.as_ref().into(),
            tms,
            params: None,
        }
    }

    /// Root folder of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if rows are numbered from the bottom.
    pub fn is_tms(&self) -> bool {
        self.tms
    }

    /// Path of the file the tile is stored to, or `None` if the writer is not configured yet.
    pub fn tile_path(&self, tile: &Tile) -> Option<PathBuf> {
        let params = self.params.as_ref()?;
        Some(self.path_for(tile, params.format))
    }

    fn path_for(&self, tile: &Tile, format: TileFormat) -> PathBuf {
        let row = if self.tms {
            to_tms_row(tile.y, tile.z)
        } else {
            tile.y
        };

        self.root
            .join(tile.z.to_string())
            .join(tile.x.to_string())
            .join(format!("{row}.{}", format.extension()))
    }
}

impl TileWriter for DirectoryWriter {
    fn configure(&mut self, params: &TileParams) -> Result<(), TilepressError> {
        debug!(
            "Writing {} tiles into {:?} (tms: {})",
            params.format.extension(),
            self.root,
            self.tms
        );
        ensure_folder_exists(&self.root)?;
        self.params = Some(params.clone());

        Ok(())
    }

    fn write_tile(&self, tile: &Tile, image: &RgbaImage) -> Result<(), TilepressError> {
        let params = self.params.as_ref().ok_or_else(not_configured)?;
        let file_path = self.path_for(tile, params.format);
        if let Some(folder) = file_path.parent() {
            ensure_folder_exists(folder)?;
        }

        let data = encode_tile(image, params.format, params.quality)?;
        std::fs::write(&file_path, data)?;
        trace!("Tile {tile:?} saved to {file_path:?}");

        Ok(())
    }

    fn close(&mut self) -> Result<(), TilepressError> {
        Ok(())
    }
}

fn ensure_folder_exists(folder_path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(folder_path)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgba;
    use tilepress_types::geo::GeoExtent;

    use super::*;

    fn params(format: TileFormat) -> TileParams {
        TileParams {
            format,
            quality: 75,
            tile_width: 4,
            tile_height: 4,
            min_zoom: 12,
            max_zoom: 12,
            extent: GeoExtent::new(0.0, 0.0, 1.0, 1.0).unwrap(),
        }
    }

    #[test]
    fn xyz_and_tms_paths() {
        let tile = Tile::new(2048, 1024, 12);

        let mut xyz = DirectoryWriter::new("/out", false);
        assert!(xyz.tile_path(&tile).is_none());
        xyz.params = Some(params(TileFormat::Png));
        assert_eq!(
            xyz.tile_path(&tile).unwrap(),
            PathBuf::from("/out/12/2048/1024.png")
        );

        let mut tms = DirectoryWriter::new("/out", true);
        tms.params = Some(params(TileFormat::Jpg));
        assert_eq!(
            tms.tile_path(&tile).unwrap(),
            PathBuf::from("/out/12/2048/3071.jpg")
        );
    }

    #[test]
    fn writes_tile_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DirectoryWriter::new(dir.path().join("tiles"), false);
        writer.configure(&params(TileFormat::Png)).unwrap();

        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let tile = Tile::new(2048, 1024, 12);
        writer.write_tile(&tile, &image).unwrap();
        writer.close().unwrap();

        let path = dir.path().join("tiles/12/2048/1024.png");
        let stored = image::open(&path).unwrap().to_rgba8();
        assert_eq!(stored, image);
    }

    #[test]
    fn write_before_configure_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DirectoryWriter::new(dir.path(), false);
        let image = RgbaImage::new(4, 4);
        assert_matches!(
            writer.write_tile(&Tile::new(0, 0, 0), &image),
            Err(TilepressError::Writer(_))
        );
    }
}
