//! Value types shared by the `tilepress` crates: cartesian rectangles and sizes, geographic
//! points and extents, and the projection used to address a tile pyramid.

pub mod cartesian;
pub mod error;
pub mod geo;
