use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::cartesian::Point2d;
use crate::geo::datum::Datum;
use crate::geo::point::{GeoPoint, GeoPoint2d, NewGeoPoint};

/// Conversion between two coordinate spaces.
pub trait Projection {
    /// Type of the input (unprojected) point.
    type InPoint;
    /// Type of the output (projected) point.
    type OutPoint;

    /// Projects the point. Returns `None` if the point cannot be represented in the output space.
    fn project(&self, input: &Self::InPoint) -> Option<Self::OutPoint>;
    /// Reverse of [`Projection::project`].
    fn unproject(&self, input: &Self::OutPoint) -> Option<Self::InPoint>;
}

/// Spherical (Pseudo) Mercator projection as used by web maps (EPSG:3857).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WebMercator {
    datum: Datum,
}

impl WebMercator {
    /// Creates a projection using the semi-major axis of the given datum as the sphere radius.
    pub fn new(datum: Datum) -> Self {
        Self { datum }
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(Datum::WGS84)
    }
}

impl Projection for WebMercator {
    type InPoint = GeoPoint2d;
    type OutPoint = Point2d;

    fn project(&self, input: &GeoPoint2d) -> Option<Point2d> {
        if input.lat().abs() >= 90.0 {
            return None;
        }

        let x = self.datum.semimajor() * input.lon_rad();
        let y = self.datum.semimajor() * (FRAC_PI_4 + input.lat_rad() / 2.0).tan().ln();

        if x.is_finite() && y.is_finite() {
            Some(Point2d::new(x, y))
        } else {
            None
        }
    }

    fn unproject(&self, input: &Point2d) -> Option<GeoPoint2d> {
        let lat = FRAC_PI_2 - 2.0 * (-input.y / self.datum.semimajor()).exp().atan();
        let lon = input.x / self.datum.semimajor();

        if lat.is_finite() && lon.is_finite() {
            Some(GeoPoint2d::latlon(lat.to_degrees(), lon.to_degrees()))
        } else {
            None
        }
    }
}
