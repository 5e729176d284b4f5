//! Partitioning of a tile grid into metatiles.
//!
//! A metatile is a rectangular block of up to `size × size` adjacent tiles of one zoom level
//! that is rendered with a single renderer call and then sliced into separate tile images.
//! Rendering bigger images amortizes per-render overhead and lets labels cross tile borders.

use std::ops::RangeInclusive;

use tilepress_types::geo::{GeoExtent, GeoPoint};

use crate::error::TilepressError;
use crate::tile::{degrees_to_tile, tile_to_degrees, tiles_per_side, Tile};

/// Inclusive range of tile indices covering an extent at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    /// Column of the western-most tiles.
    pub left: u32,
    /// Row of the northern-most tiles.
    pub top: u32,
    /// Column of the eastern-most tiles.
    pub right: u32,
    /// Row of the southern-most tiles.
    pub bottom: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TileGrid {
    /// Tiles covering the extent at the given zoom.
    ///
    /// Corners are converted with [`degrees_to_tile`] and then clamped into the pyramid, so an
    /// extent touching the antimeridian or reaching beyond the Web Mercator latitude limit still
    /// names only existing tiles.
    pub fn from_extent(extent: &GeoExtent, zoom: u8) -> Self {
        let max_index = (tiles_per_side(zoom) - 1) as i64;
        let clamp = |index: i64| index.clamp(0, max_index) as u32;

        let north_west = extent.north_west();
        let south_east = extent.south_east();
        let (left, top) = degrees_to_tile(north_west.lat(), north_west.lon(), zoom);
        let (right, bottom) = degrees_to_tile(south_east.lat(), south_east.lon(), zoom);

        Self {
            left: clamp(left),
            top: clamp(top),
            right: clamp(right),
            bottom: clamp(bottom),
            zoom,
        }
    }

    /// Number of tile columns.
    pub fn columns(&self) -> u32 {
        self.right - self.left + 1
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        self.bottom - self.top + 1
    }

    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> u64 {
        self.columns() as u64 * self.rows() as u64
    }

    /// Top-left tile of the grid.
    pub fn top_left(&self) -> Tile {
        Tile::new(self.left, self.top, self.zoom)
    }

    /// Returns true if the tile belongs to the grid.
    pub fn contains(&self, tile: &Tile) -> bool {
        tile.z == self.zoom
            && (self.left..=self.right).contains(&tile.x)
            && (self.top..=self.bottom).contains(&tile.y)
    }

    /// Tile-aligned geographic extent of the grid.
    pub fn extent(&self) -> GeoExtent {
        GeoExtent::from_corners(
            &tile_to_degrees(self.left, self.top, self.zoom),
            &tile_to_degrees(self.right + 1, self.bottom + 1, self.zoom),
        )
    }
}

/// Rectangular batch of tiles of one zoom level.
///
/// Tiles are stored with their row and column offsets inside the batch. The extent of the
/// metatile spans from its top-left to its bottom-right tile; both are tracked as tiles are added,
/// so the insertion order does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTile {
    tiles: Vec<MetaTileEntry>,
    zoom: Option<u8>,
    min: (u32, u32),
    max: (u32, u32),
}

/// Tile with its position inside a [`MetaTile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaTileEntry {
    /// Row offset of the tile inside the metatile.
    pub row: u32,
    /// Column offset of the tile inside the metatile.
    pub column: u32,
    /// The tile.
    pub tile: Tile,
}

impl Default for MetaTile {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTile {
    /// Creates an empty metatile.
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            zoom: None,
            min: (u32::MAX, u32::MAX),
            max: (0, 0),
        }
    }

    /// Adds a tile at the given row and column offsets.
    ///
    /// Fails if the tile is of a different zoom level than the tiles already added, or if the
    /// slot is already occupied.
    pub fn add_tile(&mut self, row: u32, column: u32, tile: Tile) -> Result<(), TilepressError> {
        if let Some(zoom) = self.zoom {
            if zoom != tile.z {
                return Err(TilepressError::MetaTile(format!(
                    "tile {tile:?} does not belong to zoom level {zoom}"
                )));
            }
        }

        if self
            .tiles
            .iter()
            .any(|entry| entry.row == row && entry.column == column)
        {
            return Err(TilepressError::MetaTile(format!(
                "slot ({row}, {column}) is already occupied"
            )));
        }

        self.zoom = Some(tile.z);
        self.min = (self.min.0.min(tile.x), self.min.1.min(tile.y));
        self.max = (self.max.0.max(tile.x), self.max.1.max(tile.y));
        self.tiles.push(MetaTileEntry { row, column, tile });

        Ok(())
    }

    /// Tiles of the metatile in insertion order.
    pub fn tiles(&self) -> &[MetaTileEntry] {
        &self.tiles
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns true if no tiles were added.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Zoom level of the tiles, `None` for an empty metatile.
    pub fn zoom(&self) -> Option<u8> {
        self.zoom
    }

    /// Number of tile rows (`max(row) + 1`).
    pub fn rows(&self) -> u32 {
        self.tiles.iter().map(|entry| entry.row + 1).max().unwrap_or(0)
    }

    /// Number of tile columns (`max(column) + 1`).
    pub fn columns(&self) -> u32 {
        self.tiles
            .iter()
            .map(|entry| entry.column + 1)
            .max()
            .unwrap_or(0)
    }

    /// Geographic extent from the north-west corner of the top-left tile to the south-east corner
    /// of the bottom-right tile. `None` for an empty metatile.
    pub fn extent(&self) -> Option<GeoExtent> {
        let zoom = self.zoom?;
        Some(GeoExtent::from_corners(
            &tile_to_degrees(self.min.0, self.min.1, zoom),
            &tile_to_degrees(self.max.0 + 1, self.max.1 + 1, zoom),
        ))
    }
}

/// Lazy sequence of the metatiles covering an extent at one zoom level.
///
/// The sequence can be iterated any number of times, each iteration producing the same
/// metatiles in the same order: block columns from west to east, and inside each column block
/// rows from north to south.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metatiles {
    grid: TileGrid,
    size: u32,
}

impl Metatiles {
    /// Creates the sequence for the extent at the given zoom with `size × size` blocks.
    ///
    /// `size` must be positive.
    pub fn new(extent: &GeoExtent, zoom: u8, size: u32) -> Result<Self, TilepressError> {
        Self::from_grid(TileGrid::from_extent(extent, zoom), size)
    }

    /// Creates the sequence over an already computed tile grid.
    pub fn from_grid(grid: TileGrid, size: u32) -> Result<Self, TilepressError> {
        if size == 0 {
            return Err(TilepressError::InvalidParameters(
                "Metatile size must be positive.".into(),
            ));
        }

        Ok(Self { grid, size })
    }

    /// Tile grid being partitioned.
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Number of block rows.
    pub fn block_rows(&self) -> u32 {
        self.grid.rows().div_ceil(self.size)
    }

    /// Number of block columns.
    pub fn block_columns(&self) -> u32 {
        self.grid.columns().div_ceil(self.size)
    }

    /// Number of metatiles in the sequence, computed without producing them.
    pub fn count(&self) -> u64 {
        self.block_rows() as u64 * self.block_columns() as u64
    }

    /// Iterates over the metatiles.
    pub fn iter(&self) -> MetatileIter {
        MetatileIter {
            metatiles: *self,
            next_block: 0,
        }
    }

    fn block(&self, block_column: u32, block_row: u32) -> MetaTile {
        let mut metatile = MetaTile::new();
        let left = self.grid.left + block_column * self.size;
        let top = self.grid.top + block_row * self.size;

        for i in 0..self.size {
            for j in 0..self.size {
                let x = left + i;
                let y = top + j;
                if x <= self.grid.right && y <= self.grid.bottom {
                    metatile.tiles.push(MetaTileEntry {
                        row: j,
                        column: i,
                        tile: Tile::new(x, y, self.grid.zoom),
                    });
                }
            }
        }

        metatile.zoom = Some(self.grid.zoom);
        metatile.min = (left, top);
        metatile.max = (
            (left + self.size - 1).min(self.grid.right),
            (top + self.size - 1).min(self.grid.bottom),
        );

        metatile
    }
}

impl IntoIterator for &Metatiles {
    type Item = MetaTile;
    type IntoIter = MetatileIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over [`Metatiles`].
#[derive(Debug, Clone)]
pub struct MetatileIter {
    metatiles: Metatiles,
    next_block: u64,
}

impl Iterator for MetatileIter {
    type Item = MetaTile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_block >= self.metatiles.count() {
            return None;
        }

        let block_rows = self.metatiles.block_rows() as u64;
        let block_column = (self.next_block / block_rows) as u32;
        let block_row = (self.next_block % block_rows) as u32;
        self.next_block += 1;

        Some(self.metatiles.block(block_column, block_row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.metatiles.count() - self.next_block) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MetatileIter {}

/// Number of metatiles covering the extent at the given zoom level.
pub fn count_metatiles(extent: &GeoExtent, zoom: u8, size: u32) -> Result<u64, TilepressError> {
    Ok(Metatiles::new(extent, zoom, size)?.count())
}

/// Number of metatiles covering the extent at all the given zoom levels.
pub fn count_metatiles_in_range(
    extent: &GeoExtent,
    zoom_levels: RangeInclusive<u8>,
    size: u32,
) -> Result<u64, TilepressError> {
    let mut total = 0;
    for zoom in zoom_levels {
        total += count_metatiles(extent, zoom, size)?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    use super::*;

    fn europe() -> GeoExtent {
        GeoExtent::new(-10.0, 40.0, 10.0, 50.0).unwrap()
    }

    fn extents() -> Vec<GeoExtent> {
        vec![
            europe(),
            GeoExtent::new(-180.0, -85.0, 180.0, 85.0).unwrap(),
            GeoExtent::new(13.3, 52.4, 13.5, 52.6).unwrap(),
            GeoExtent::new(151.2, -33.9, 151.2, -33.9).unwrap(),
            GeoExtent::new(-74.3, 40.4, -73.6, 41.0).unwrap(),
        ]
    }

    #[test]
    fn tile_grid_of_extent() {
        let grid = TileGrid::from_extent(&europe(), 2);
        assert_eq!(
            grid,
            TileGrid {
                left: 1,
                top: 1,
                right: 2,
                bottom: 1,
                zoom: 2
            }
        );
        assert_eq!(grid.tile_count(), 2);

        let grid = TileGrid::from_extent(&europe(), 0);
        assert_eq!(grid.tile_count(), 1);
    }

    #[test]
    fn tile_grid_is_clamped_to_pyramid() {
        let world = GeoExtent::new(-180.0, -85.2, 180.0, 85.2).unwrap();
        for zoom in [0, 1, 4] {
            let grid = TileGrid::from_extent(&world, zoom);
            let max = tiles_per_side(zoom) as u32 - 1;
            assert_eq!((grid.left, grid.top, grid.right, grid.bottom), (0, 0, max, max));
        }
    }

    #[test]
    fn single_tile_metatiles() {
        for extent in extents() {
            for zoom in [0, 3, 7] {
                let metatiles = Metatiles::new(&extent, zoom, 1).unwrap();
                let grid = *metatiles.grid();
                let mut seen = HashSet::new();
                for metatile in &metatiles {
                    assert_eq!(metatile.len(), 1);
                    assert_eq!((metatile.rows(), metatile.columns()), (1, 1));
                    assert!(seen.insert(metatile.tiles()[0].tile));
                }

                assert_eq!(seen.len() as u64, grid.tile_count());
                assert!(seen.iter().all(|tile| grid.contains(tile)));
            }
        }
    }

    #[test]
    fn count_matches_produced_sequence() {
        for extent in extents() {
            for zoom in [0, 2, 5, 9] {
                for size in [1, 2, 3, 4, 7, 20] {
                    let metatiles = Metatiles::new(&extent, zoom, size).unwrap();
                    assert_eq!(
                        metatiles.iter().count() as u64,
                        count_metatiles(&extent, zoom, size).unwrap(),
                        "{extent:?} z{zoom} size {size}"
                    );
                    assert_eq!(metatiles.iter().len() as u64, metatiles.count());
                }
            }
        }
    }

    #[test]
    fn every_tile_is_produced_exactly_once() {
        let extent = GeoExtent::new(-74.3, 40.4, -73.6, 41.0).unwrap();
        let metatiles = Metatiles::new(&extent, 11, 4).unwrap();
        let mut seen = HashSet::new();
        for metatile in &metatiles {
            for entry in metatile.tiles() {
                assert!(seen.insert(entry.tile), "{:?} produced twice", entry.tile);
            }
        }
        assert_eq!(seen.len() as u64, metatiles.grid().tile_count());
    }

    #[test]
    fn ragged_edge_blocks() {
        let grid = TileGrid {
            left: 10,
            top: 20,
            right: 14,
            bottom: 22,
            zoom: 6,
        };
        let metatiles: Vec<_> = Metatiles::from_grid(grid, 4).unwrap().iter().collect();
        assert_eq!(metatiles.len(), 2);

        assert_eq!(metatiles[0].columns(), 4);
        assert_eq!(metatiles[0].rows(), 3);
        assert_eq!(metatiles[0].len(), 12);

        assert_eq!(metatiles[1].columns(), 1);
        assert_eq!(metatiles[1].rows(), 3);
        assert_eq!(metatiles[1].tiles()[0].tile, Tile::new(14, 20, 6));
    }

    #[test]
    fn blocks_are_traversed_column_major() {
        let grid = TileGrid {
            left: 0,
            top: 0,
            right: 3,
            bottom: 3,
            zoom: 2,
        };
        let firsts: Vec<_> = Metatiles::from_grid(grid, 2)
            .unwrap()
            .iter()
            .map(|metatile| metatile.tiles()[0].tile)
            .collect();
        assert_eq!(
            firsts,
            vec![
                Tile::new(0, 0, 2),
                Tile::new(0, 2, 2),
                Tile::new(2, 0, 2),
                Tile::new(2, 2, 2),
            ]
        );

        let first = Metatiles::from_grid(grid, 2).unwrap().iter().next().unwrap();
        let order: Vec<_> = first.tiles().iter().map(|entry| entry.tile).collect();
        assert_eq!(
            order,
            vec![
                Tile::new(0, 0, 2),
                Tile::new(0, 1, 2),
                Tile::new(1, 0, 2),
                Tile::new(1, 1, 2),
            ]
        );
    }

    #[test]
    fn sequence_is_restartable() {
        let metatiles = Metatiles::new(&europe(), 6, 3).unwrap();
        let first: Vec<_> = metatiles.iter().collect();
        let second: Vec<_> = metatiles.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn metatile_extent_spans_corner_tiles() {
        let metatiles = Metatiles::new(&europe(), 8, 4).unwrap();
        for metatile in &metatiles {
            let extent = metatile.extent().unwrap();
            let first = metatile.tiles().first().unwrap().tile.extent();
            let last = metatile.tiles().last().unwrap().tile.extent();
            assert_abs_diff_eq!(extent.west(), first.west());
            assert_abs_diff_eq!(extent.north(), first.north());
            assert_abs_diff_eq!(extent.east(), last.east());
            assert_abs_diff_eq!(extent.south(), last.south());
        }
    }

    #[test]
    fn extent_does_not_depend_on_insertion_order() {
        let mut metatile = MetaTile::new();
        metatile.add_tile(1, 1, Tile::new(5, 7, 4)).unwrap();
        metatile.add_tile(0, 0, Tile::new(4, 6, 4)).unwrap();
        metatile.add_tile(0, 1, Tile::new(5, 6, 4)).unwrap();

        let expected = Tile::new(4, 6, 4).extent().merge(&Tile::new(5, 7, 4).extent());
        assert_eq!(metatile.extent().unwrap(), expected);
        assert_eq!((metatile.rows(), metatile.columns()), (2, 2));
    }

    #[test]
    fn add_tile_rejects_invalid_tiles() {
        let mut metatile = MetaTile::new();
        assert!(metatile.extent().is_none());
        metatile.add_tile(0, 0, Tile::new(0, 0, 3)).unwrap();
        assert_matches!(
            metatile.add_tile(0, 1, Tile::new(1, 0, 4)),
            Err(TilepressError::MetaTile(_))
        );
        assert_matches!(
            metatile.add_tile(0, 0, Tile::new(1, 0, 3)),
            Err(TilepressError::MetaTile(_))
        );
        assert_eq!(metatile.len(), 1);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert_matches!(
            Metatiles::new(&europe(), 3, 0),
            Err(TilepressError::InvalidParameters(_))
        );
    }

    #[test]
    fn count_over_zoom_range() {
        let total = count_metatiles_in_range(&europe(), 0..=2, 4).unwrap();
        assert_eq!(total, 3);
    }
}
