//! Tile indices of the slippy map (XYZ) scheme and conversion between them and geographic
//! coordinates.
//!
//! Rows are counted from the top of the map (Google/OSM convention). [`to_tms_row`] converts
//! them into the bottom-origin numbering used by TMS and MBTiles.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tilepress_types::geo::{GeoExtent, GeoPoint2d, NewGeoPoint};

/// Index of a single tile.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Column, counted from the antimeridian eastwards.
    pub x: u32,
    /// Row, counted from the top of the map.
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

impl Tile {
    /// Create a new index instance.
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Geographic bounding box of the tile.
    pub fn extent(&self) -> GeoExtent {
        GeoExtent::from_corners(
            &tile_to_degrees(self.x, self.y, self.z),
            &tile_to_degrees(self.x + 1, self.y + 1, self.z),
        )
    }

    /// Row of the tile in TMS numbering.
    pub fn tms_row(&self) -> u32 {
        to_tms_row(self.y, self.z)
    }
}

/// Number of tiles along one side of the pyramid at the given zoom level.
pub fn tiles_per_side(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Index of the tile containing the given point.
///
/// The result is not clamped to the pyramid: longitudes of `180` give `x == 2^zoom`, and the
/// row grows without bound as the latitude approaches a pole (`±90` itself saturates the
/// integer). Clamp the latitude to
/// [`MAX_WEB_MERCATOR_LAT`](tilepress_types::geo::MAX_WEB_MERCATOR_LAT) to stay inside.
pub fn degrees_to_tile(lat: f64, lon: f64, zoom: u8) -> (i64, i64) {
    let lat_rad = lat.to_radians();
    let n = tiles_per_side(zoom) as f64;
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    (x as i64, y as i64)
}

/// Coordinates of the north-west corner of the tile `(x, y)`.
pub fn tile_to_degrees(x: u32, y: u32, zoom: u8) -> GeoPoint2d {
    let n = tiles_per_side(zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();

    GeoPoint2d::latlon(lat, lon)
}

/// Converts a top-origin row into a bottom-origin (TMS) row and back.
///
/// `y` must be inside the pyramid, i.e. `y < 2^zoom`.
pub fn to_tms_row(y: u32, zoom: u8) -> u32 {
    debug_assert!((y as u64) < tiles_per_side(zoom));
    (tiles_per_side(zoom) - 1 - y as u64) as u32
}
