//! Errors reported by the allocator and the transform operators.

use thiserror::Error;

/// Failure of a surface allocation or transform.
///
/// Every variant is reported before any destination pixel is written; a
/// failed call never hands back a partially filled surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The pixel depth is outside the 1-4 bytes the engines understand.
    #[error("unsupported surface bit depth for transform: {bytes_per_pixel} bytes per pixel")]
    UnsupportedFormat { bytes_per_pixel: u8 },

    /// The destination buffer could not be obtained.
    #[error("could not allocate a {width}x{height} surface: {reason}")]
    Allocation {
        width: usize,
        height: usize,
        reason: String,
    },

    /// A requested surface size has a zero extent.
    #[error("invalid surface size {width}x{height}: both extents must be at least 1")]
    InvalidDimensions { width: usize, height: usize },

    /// The rotation angle is NaN or infinite.
    #[error("rotation angle must be finite")]
    NonFiniteAngle,

    /// A preallocated destination does not have the size the operator writes.
    #[error("destination is {width}x{height}, expected {expected_width}x{expected_height}")]
    DestinationSize {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    /// A preallocated destination does not share the source pixel format.
    #[error(
        "destination pixel format does not match the source ({bytes_per_pixel} vs {expected_bytes_per_pixel} bytes per pixel)"
    )]
    DestinationFormat {
        expected_bytes_per_pixel: u8,
        bytes_per_pixel: u8,
    },

    /// Raw pixel bytes handed to [`Surface::from_raw`](crate::Surface::from_raw)
    /// cannot hold the declared geometry.
    #[error(
        "pixel buffer of {len} bytes cannot hold {height} rows of {row_bytes} bytes with pitch {pitch}"
    )]
    InvalidLayout {
        row_bytes: usize,
        pitch: usize,
        height: usize,
        len: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TransformError>;
