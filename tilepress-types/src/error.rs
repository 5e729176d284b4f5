//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error, PartialEq)]
pub enum TypesError {
    /// A coordinate is NaN or infinite.
    #[error("coordinate is not finite: {0}")]
    NotFinite(String),
    /// Extent edges are in the wrong order.
    #[error("invalid extent: {0}")]
    InvalidExtent(String),
    /// The point cannot be represented in the target projection.
    #[error("point cannot be projected: {0}")]
    Projection(String),
}
