use nalgebra::{Point2, Scalar};
use num_traits::Num;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect<N = f64> {
    /// Minimum value of the X coordinate.
    pub x_min: N,
    /// Minimum value of the Y coordinate.
    pub y_min: N,
    /// Maximum value of the X coordinate.
    pub x_max: N,
    /// Maximum value of the Y coordinate.
    pub y_max: N,
}

impl<N: Num + Copy + PartialOrd + Scalar> Rect<N> {
    /// Creates a new rectangle. The caller is responsible for `x_min <= x_max` and `y_min <= y_max`.
    pub fn new(x_min: N, y_min: N, x_max: N, y_max: N) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Minimum value of the X coordinate.
    pub fn x_min(&self) -> N {
        self.x_min
    }

    /// Maximum value of the X coordinate.
    pub fn x_max(&self) -> N {
        self.x_max
    }

    /// Minimum value of the Y coordinate.
    pub fn y_min(&self) -> N {
        self.y_min
    }

    /// Maximum value of the Y coordinate.
    pub fn y_max(&self) -> N {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> N {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> N {
        self.y_max - self.y_min
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: min(self.x_min, other.x_min),
            y_min: min(self.y_min, other.y_min),
            x_max: max(self.x_max, other.x_max),
            y_max: max(self.y_max, other.y_max),
        }
    }

    /// Bounding rectangle of the given points. Returns `None` if the iterator is empty.
    pub fn from_points(mut points: impl Iterator<Item = Point2<N>>) -> Option<Self> {
        let first = points.next()?;
        let mut rect = Self::new(first.x, first.y, first.x, first.y);
        for p in points {
            rect = rect.merge(Self::new(p.x, p.y, p.x, p.y));
        }

        Some(rect)
    }
}

fn min<N: PartialOrd>(a: N, b: N) -> N {
    if a < b {
        a
    } else {
        b
    }
}

fn max<N: PartialOrd>(a: N, b: N) -> N {
    if a > b {
        a
    } else {
        b
    }
}
