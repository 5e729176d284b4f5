use num_traits::NumCast;
use serde::{Deserialize, Serialize};

/// Width and height of a raster or an area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size<Num = f64> {
    width: Num,
    height: Num,
}

impl<Num: num_traits::Num + PartialOrd + Copy + NumCast> Size<Num> {
    /// Creates a new size.
    pub fn new(width: Num, height: Num) -> Self {
        Self { width, height }
    }

    /// Width.
    pub fn width(&self) -> Num {
        self.width
    }

    /// Height.
    pub fn height(&self) -> Num {
        self.height
    }

    /// Returns true if either of the dimensions is zero.
    pub fn is_zero(&self) -> bool {
        self.width.is_zero() || self.height.is_zero()
    }
}
