use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbaImage;
use log::{debug, trace};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::TilepressError;
use crate::metatile::TileGrid;
use crate::raster::encode_tile;
use crate::tile::{to_tms_row, Tile};
use crate::writer::{not_configured, TileParams, TileWriter};

const BUSY_TIMEOUT: Duration = Duration::from_secs(120);
const MBTILES_VERSION: &str = "1.1";

/// Stores tiles in an [MBTiles](https://github.com/mapbox/mbtiles-spec) package.
///
/// The package is (re)created on [`configure`](TileWriter::configure). Tiles can be written from
/// many threads; access to the database is serialized by an internal lock.
pub struct MbtilesWriter {
    path: PathBuf,
    package: Option<Package>,
}

struct Package {
    params: TileParams,
    state: Mutex<PackageState>,
}

struct PackageState {
    connection: Connection,
    layer: Option<ZoomLayer>,
}

/// Mosaic of the tiles of one zoom level covering the run extent.
///
/// Tiles are placed by their pixel offset from the top-left tile of the zoom level.
#[derive(Debug, Clone, Copy)]
struct ZoomLayer {
    grid: TileGrid,
    tile_width: u32,
    tile_height: u32,
}

impl ZoomLayer {
    fn new(params: &TileParams, zoom: u8) -> Self {
        Self {
            grid: TileGrid::from_extent(&params.extent, zoom),
            tile_width: params.tile_width,
            tile_height: params.tile_height,
        }
    }

    fn zoom(&self) -> u8 {
        self.grid.zoom
    }

    fn offset(&self, tile: &Tile) -> Result<(u64, u64), TilepressError> {
        if !self.grid.contains(tile) {
            return Err(TilepressError::Writer(format!(
                "tile {tile:?} is outside of the mosaic of zoom level {}",
                self.grid.zoom
            )));
        }

        let reference = self.grid.top_left();
        Ok((
            (tile.x - reference.x) as u64 * self.tile_width as u64,
            (tile.y - reference.y) as u64 * self.tile_height as u64,
        ))
    }

    /// `(tile_column, tile_row)` of the mosaic cell at the pixel offset, with TMS row numbering.
    fn cell_at(&self, x_offset: u64, y_offset: u64) -> (u32, u32) {
        let reference = self.grid.top_left();
        let column = reference.x + (x_offset / self.tile_width as u64) as u32;
        let row = reference.y + (y_offset / self.tile_height as u64) as u32;

        (column, to_tms_row(row, self.grid.zoom))
    }
}

impl MbtilesWriter {
    /// Creates a writer for the package at the given path. The parent folder is created if it
    /// does not exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, TilepressError> {
        let path = path.as_ref();
        if let Some(folder) = path.parent() {
            if !folder.as_os_str().is_empty() {
                std::fs::create_dir_all(folder)?;
            }
        }

        Ok(Self {
            path: path.into(),
            package: None,
        })
    }

    /// Path of the package.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove_previous(&self) -> Result<(), TilepressError> {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let file = PathBuf::from(file);
            if file.exists() {
                debug!("Removing previous package file {file:?}");
                std::fs::remove_file(&file)?;
            }
        }

        Ok(())
    }

    fn package_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl TileWriter for MbtilesWriter {
    fn configure(&mut self, params: &TileParams) -> Result<(), TilepressError> {
        if self.package.is_some() {
            return Err(TilepressError::Writer(
                "MBTiles writer is already configured".into(),
            ));
        }

        self.remove_previous()?;

        let connection = Connection::open(&self.path)?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        connection.execute_batch(
            "
            CREATE TABLE metadata (name TEXT, value TEXT);
            CREATE TABLE tiles (
                zoom_level INTEGER,
                tile_column INTEGER,
                tile_row INTEGER,
                tile_data BLOB
            );
            CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);
            ",
        )?;

        let name = self.package_name();
        let metadata = [
            ("name", name.clone()),
            ("type", "baselayer".to_string()),
            ("version", MBTILES_VERSION.to_string()),
            ("description", name),
            ("format", params.format.extension().to_string()),
            ("minzoom", params.min_zoom.to_string()),
            ("maxzoom", params.max_zoom.to_string()),
            ("bounds", String::new()),
        ];
        for (name, value) in metadata {
            connection.execute(
                "INSERT INTO metadata (name, value) VALUES (?1, ?2)",
                params![name, value],
            )?;
        }

        let mode: String =
            connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Created MBTiles package {:?} (journal mode {mode})", self.path);

        self.package = Some(Package {
            params: params.clone(),
            state: Mutex::new(PackageState {
                connection,
                layer: None,
            }),
        });

        Ok(())
    }

    fn write_tile(&self, tile: &Tile, image: &RgbaImage) -> Result<(), TilepressError> {
        let package = self.package.as_ref().ok_or_else(not_configured)?;
        let params = &package.params;
        if image.dimensions() != (params.tile_width, params.tile_height) {
            return Err(TilepressError::Writer(format!(
                "tile image is {:?} pixels, expected {}x{}",
                image.dimensions(),
                params.tile_width,
                params.tile_height
            )));
        }

        let data = encode_tile(image, params.format, params.quality)?;

        let mut state = package.state.lock();
        let layer = match state.layer {
            Some(layer) if layer.zoom() == tile.z => layer,
            _ => {
                let layer = ZoomLayer::new(params, tile.z);
                let bounds = layer.grid.extent().to_string();
                debug!("Starting zoom level {} with bounds {bounds}", tile.z);
                state.connection.execute(
                    "UPDATE metadata SET value = ?1 WHERE name = 'bounds'",
                    params![bounds],
                )?;
                state.layer = Some(layer);
                layer
            }
        };

        let (x_offset, y_offset) = layer.offset(tile)?;
        let (column, row) = layer.cell_at(x_offset, y_offset);
        state.connection.execute(
            "INSERT OR REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            params![tile.z, column, row, data],
        )?;
        trace!("Tile {tile:?} stored at column {column}, row {row}");

        Ok(())
    }

    fn close(&mut self) -> Result<(), TilepressError> {
        let Some(package) = self.package.take() else {
            return Ok(());
        };

        let state = package.state.into_inner();
        state.connection.execute(
            "UPDATE metadata SET value = ?1 WHERE name = 'bounds'",
            params![package.params.extent.to_string()],
        )?;
        let mode: String = state.connection.pragma_update_and_check(
            None,
            "journal_mode",
            "DELETE",
            |row| row.get(0),
        )?;
        state.connection.close().map_err(|(_, err)| err)?;
        debug!("Closed MBTiles package {:?} (journal mode {mode})", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgba;
    use tilepress_types::geo::GeoExtent;

    use super::*;
    use crate::raster::TileFormat;

    fn params() -> TileParams {
        TileParams {
            format: TileFormat::Png,
            quality: 75,
            tile_width: 8,
            tile_height: 8,
            min_zoom: 1,
            max_zoom: 2,
            extent: GeoExtent::new(-10.0, 40.0, 10.0, 50.0).unwrap(),
        }
    }

    fn metadata(connection: &Connection, name: &str) -> String {
        connection
            .query_row(
                "SELECT value FROM metadata WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn tile_image() -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba([200, 100, 0, 255]))
    }

    #[test]
    fn creates_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/world.mbtiles");
        let mut writer = MbtilesWriter::new(&path).unwrap();
        writer.configure(&params()).unwrap();

        writer.write_tile(&Tile::new(0, 0, 1), &tile_image()).unwrap();
        {
            let connection = Connection::open(&path).unwrap();
            let zoom_bounds = TileGrid::from_extent(&params().extent, 1).extent();
            assert_eq!(metadata(&connection, "bounds"), zoom_bounds.to_string());
        }

        writer.write_tile(&Tile::new(1, 1, 2), &tile_image()).unwrap();
        writer.write_tile(&Tile::new(2, 1, 2), &tile_image()).unwrap();
        writer.close().unwrap();

        let connection = Connection::open(&path).unwrap();
        assert_eq!(metadata(&connection, "name"), "world");
        assert_eq!(metadata(&connection, "type"), "baselayer");
        assert_eq!(metadata(&connection, "format"), "png");
        assert_eq!(metadata(&connection, "minzoom"), "1");
        assert_eq!(metadata(&connection, "maxzoom"), "2");
        assert_eq!(metadata(&connection, "bounds"), "-10,40,10,50");

        let mode: String = connection
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "delete");

        let mut statement = connection
            .prepare("SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles ORDER BY zoom_level, tile_column")
            .unwrap();
        let rows: Vec<(u8, u32, u32, Vec<u8>)> = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let cells: Vec<_> = rows.iter().map(|(z, x, y, _)| (*z, *x, *y)).collect();
        assert_eq!(cells, vec![(1, 0, 1), (2, 1, 2), (2, 2, 2)]);

        let decoded = image::load_from_memory(&rows[0].3).unwrap().to_rgba8();
        assert_eq!(decoded, tile_image());
    }

    #[test]
    fn replaces_previous_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.mbtiles");
        std::fs::write(&path, b"not a database").unwrap();

        let mut writer = MbtilesWriter::new(&path).unwrap();
        writer.configure(&params()).unwrap();
        writer.close().unwrap();

        let connection = Connection::open(&path).unwrap();
        let count: u32 = connection
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn rejects_tiles_outside_of_mosaic() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MbtilesWriter::new(dir.path().join("tiles.mbtiles")).unwrap();
        writer.configure(&params()).unwrap();

        assert_matches!(
            writer.write_tile(&Tile::new(3, 3, 2), &tile_image()),
            Err(TilepressError::Writer(_))
        );
        assert_matches!(
            writer.write_tile(&Tile::new(1, 1, 2), &RgbaImage::new(4, 4)),
            Err(TilepressError::Writer(_))
        );
        writer.close().unwrap();
    }

    #[test]
    fn unconfigured_writer() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MbtilesWriter::new(dir.path().join("tiles.mbtiles")).unwrap();
        assert_matches!(
            writer.write_tile(&Tile::new(0, 0, 0), &tile_image()),
            Err(TilepressError::Writer(_))
        );
        writer.close().unwrap();
        assert!(!writer.path().exists());
    }
}
