//! Geographic coordinates (latitude and longitude) (see [`GeoPoint`], [`GeoExtent`]) and conversion
//! between geographic and projected coordinate systems (see [`Projection`], [`Crs`]).

mod crs;
mod datum;
mod extent;
mod point;
mod projection;

pub use crs::{Crs, ProjectionType};
pub use datum::Datum;
pub use extent::{GeoExtent, MAX_WEB_MERCATOR_LAT};
pub use point::{GeoPoint, GeoPoint2d, NewGeoPoint};
pub use projection::{Projection, WebMercator};
