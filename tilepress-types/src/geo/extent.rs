use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::geo::point::{GeoPoint, GeoPoint2d, NewGeoPoint};

/// Maximum latitude representable in Web Mercator, in degrees. Web Mercator tile pyramids are
/// square, so they end at `atan(sinh(π))`.
pub const MAX_WEB_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Geographic bounding box in degrees.
///
/// Serialized as `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct GeoExtent {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl GeoExtent {
    /// Creates a new extent. All edges must be finite, `west <= east` and `south <= north`.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, TypesError> {
        for value in [west, south, east, north] {
            if !value.is_finite() {
                return Err(TypesError::NotFinite(format!(
                    "[{west}, {south}, {east}, {north}]"
                )));
            }
        }

        if west > east || south > north {
            return Err(TypesError::InvalidExtent(format!(
                "edges out of order: [{west}, {south}, {east}, {north}]"
            )));
        }

        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Smallest extent containing both corner points, in any order.
    pub fn from_corners(a: &impl GeoPoint<Num = f64>, b: &impl GeoPoint<Num = f64>) -> Self {
        Self {
            west: a.lon().min(b.lon()),
            south: a.lat().min(b.lat()),
            east: a.lon().max(b.lon()),
            north: a.lat().max(b.lat()),
        }
    }

    /// Western edge (minimum longitude).
    pub fn west(&self) -> f64 {
        self.west
    }

    /// Southern edge (minimum latitude).
    pub fn south(&self) -> f64 {
        self.south
    }

    /// Eastern edge (maximum longitude).
    pub fn east(&self) -> f64 {
        self.east
    }

    /// Northern edge (maximum latitude).
    pub fn north(&self) -> f64 {
        self.north
    }

    /// North-west corner.
    pub fn north_west(&self) -> GeoPoint2d {
        GeoPoint2d::latlon(self.north, self.west)
    }

    /// South-east corner.
    pub fn south_east(&self) -> GeoPoint2d {
        GeoPoint2d::latlon(self.south, self.east)
    }

    /// Midpoint of the extent.
    pub fn center(&self) -> GeoPoint2d {
        GeoPoint2d::latlon(
            self.south + (self.north - self.south) / 2.0,
            self.west + (self.east - self.west) / 2.0,
        )
    }

    /// Returns true if the point lies inside the extent or on its border.
    pub fn contains(&self, point: &impl GeoPoint<Num = f64>) -> bool {
        self.west <= point.lon()
            && point.lon() <= self.east
            && self.south <= point.lat()
            && point.lat() <= self.north
    }

    /// Returns a copy of the extent limited to the area covered by Web Mercator tiles.
    pub fn clamp_to_web_mercator(&self) -> Self {
        Self {
            west: self.west.clamp(-180.0, 180.0),
            south: self.south.clamp(-MAX_WEB_MERCATOR_LAT, MAX_WEB_MERCATOR_LAT),
            east: self.east.clamp(-180.0, 180.0),
            north: self.north.clamp(-MAX_WEB_MERCATOR_LAT, MAX_WEB_MERCATOR_LAT),
        }
    }

    /// Smallest extent containing both `self` and `other`.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }
}

impl Display for GeoExtent {
    /// Formats the extent as `west,south,east,north`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl TryFrom<[f64; 4]> for GeoExtent {
    type Error = TypesError;

    fn try_from([west, south, east, north]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(west, south, east, north)
    }
}

impl From<GeoExtent> for [f64; 4] {
    fn from(value: GeoExtent) -> Self {
        [value.west, value.south, value.east, value.north]
    }
}
