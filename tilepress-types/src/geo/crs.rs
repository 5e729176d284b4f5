use serde::{Deserialize, Serialize};

use crate::cartesian::{Point2d, Rect};
use crate::error::TypesError;
use crate::geo::datum::Datum;
use crate::geo::extent::GeoExtent;
use crate::geo::point::{GeoPoint, NewGeoPoint};
use crate::geo::projection::{Projection, WebMercator};
use crate::geo::GeoPoint2d;

/// Coordinate reference system.
///
/// Serialized as its authority code, e.g. `"EPSG:3857"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    datum: Datum,
    projection_type: ProjectionType,
}

/// Method used to project geographic coordinates into the coordinates of a [`Crs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProjectionType {
    /// Geographic coordinates in degrees, longitude as X and latitude as Y.
    None,
    /// Spherical mercator.
    WebMercator,
}

impl Crs {
    /// Geographic WGS84 coordinates (EPSG:4326).
    pub const WGS84: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::None,
    };

    /// Web Mercator (EPSG:3857).
    pub const EPSG3857: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::WebMercator,
    };

    /// Datum of the CRS.
    pub fn datum(&self) -> Datum {
        self.datum
    }

    /// Projection type of the CRS.
    pub fn projection_type(&self) -> ProjectionType {
        self.projection_type
    }

    /// Authority code of the CRS.
    pub fn code(&self) -> &'static str {
        match self.projection_type {
            ProjectionType::None => "EPSG:4326",
            ProjectionType::WebMercator => "EPSG:3857",
        }
    }

    /// Returns true if coordinates of this CRS are measured in meters.
    pub fn is_projected(&self) -> bool {
        self.projection_type != ProjectionType::None
    }

    fn project_point(&self, point: &GeoPoint2d) -> Option<Point2d> {
        match self.projection_type {
            ProjectionType::None => Some(Point2d::new(point.lon(), point.lat())),
            ProjectionType::WebMercator => WebMercator::new(self.datum).project(point),
        }
    }

    fn unproject_point(&self, point: &Point2d) -> Option<GeoPoint2d> {
        match self.projection_type {
            ProjectionType::None => Some(GeoPoint2d::latlon(point.y, point.x)),
            ProjectionType::WebMercator => WebMercator::new(self.datum).unproject(point),
        }
    }

    /// Projects a geographic extent into a bounding box in this CRS.
    ///
    /// Both supported projections preserve axis ordering, so the corners of the extent map to the
    /// corners of the result.
    pub fn project_extent(&self, extent: &GeoExtent) -> Result<Rect, TypesError> {
        let corners = [
            GeoPoint2d::latlon(extent.south(), extent.west()),
            GeoPoint2d::latlon(extent.north(), extent.east()),
        ];
        let mut projected = Vec::with_capacity(corners.len());
        for corner in &corners {
            let point = self.project_point(corner).ok_or_else(|| {
                TypesError::Projection(format!("{corner:?} in {}", self.code()))
            })?;
            projected.push(point);
        }

        Rect::from_points(projected.into_iter())
            .ok_or_else(|| TypesError::Projection("empty extent".into()))
    }

    /// Converts a bounding box given in this CRS into a geographic extent.
    pub fn unproject_rect(&self, rect: &Rect) -> Result<GeoExtent, TypesError> {
        let south_west = self
            .unproject_point(&Point2d::new(rect.x_min(), rect.y_min()))
            .ok_or_else(|| TypesError::Projection(format!("{rect:?} from {}", self.code())))?;
        let north_east = self
            .unproject_point(&Point2d::new(rect.x_max(), rect.y_max()))
            .ok_or_else(|| TypesError::Projection(format!("{rect:?} from {}", self.code())))?;

        GeoExtent::new(
            south_west.lon(),
            south_west.lat(),
            north_east.lon(),
            north_east.lat(),
        )
    }
}

impl TryFrom<String> for Crs {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "WGS84" => Ok(Crs::WGS84),
            "EPSG:3857" | "EPSG:900913" => Ok(Crs::EPSG3857),
            _ => Err(TypesError::Projection(format!("unsupported CRS: {value}"))),
        }
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.code().to_string()
    }
}
