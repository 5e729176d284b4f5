//! Types in cartesian (projected or pixel) coordinates.

mod rect;
mod size;

pub use nalgebra::Point2;
pub use rect::Rect;
pub use size::Size;

/// 2d point with `f64` coordinates.
pub type Point2d = Point2<f64>;
